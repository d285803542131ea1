//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use donation_map::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One canned answer, picked by path prefix (`/search`, `/reverse`)
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: &'static str,
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Route {
    pub fn json(prefix: &'static str, body: &str) -> Self {
        Self {
            prefix,
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(prefix: &'static str, status: u16) -> Self {
        Self {
            prefix,
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Minimal HTTP/1.1 responder on a loopback port
pub struct Responder {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Responder {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&head);
                    let target = head
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    seen.lock().unwrap().push(target.clone());

                    let route = routes
                        .iter()
                        .find(|route| target.starts_with(route.prefix))
                        .cloned()
                        .unwrap_or_else(|| Route::status("/", 404));
                    tokio::time::sleep(route.delay).await;

                    let response = format!(
                        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        route.status,
                        route.body.len(),
                        route.body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base_url, requests }
    }

    /// Request targets (path and query) in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn geocoder_config(&self) -> GeocoderConfig {
        GeocoderConfig {
            base_url: self.base_url.clone(),
            timeout_ms: 2_000,
            ..GeocoderConfig::default()
        }
    }
}

pub fn layer_canvas(controller: &MapCanvasController) -> &LayerCanvas {
    controller
        .backend()
        .as_any()
        .downcast_ref::<LayerCanvas>()
        .expect("views in tests run on a LayerCanvas")
}

pub async fn ready_loader() -> Arc<AssetLoader> {
    let loader = Arc::new(AssetLoader::new(
        Arc::new(PreloadedAssetHost),
        AssetConfig::default(),
    ));
    loader.ensure_ready().await.unwrap();
    loader
}

/// Collects every value a view reports upward
pub fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |value: &str| sink.lock().unwrap().push(value.to_string()))
}
