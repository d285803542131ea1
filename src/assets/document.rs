//! Browser host: injects `<link>` and `<script>` tags into the page.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Element, Event, HtmlLinkElement, HtmlScriptElement};

use super::host::{AssetHost, AssetKind, AssetLoadError};

/// Global the library defines, and the namespace the plugin adds to it
const LIBRARY_GLOBAL: &str = "L";
const PLUGIN_NAMESPACE: &str = "Routing";

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentAssetHost;

impl DocumentAssetHost {
    pub fn new() -> Self {
        Self
    }
}

fn js_reason(value: JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

/// Whether the library (and optionally its plugin namespace) is visible on `window`
fn namespace_present(with_plugin: bool) -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    let Ok(library) = js_sys::Reflect::get(&window, &JsValue::from_str(LIBRARY_GLOBAL)) else {
        return false;
    };
    if library.is_undefined() || library.is_null() {
        return false;
    }
    !with_plugin
        || js_sys::Reflect::has(&library, &JsValue::from_str(PLUGIN_NAMESPACE)).unwrap_or(false)
}

#[async_trait(?Send)]
impl AssetHost for DocumentAssetHost {
    async fn load(&self, asset: AssetKind, url: &str) -> Result<(), AssetLoadError> {
        let fail = |reason: String| AssetLoadError::new(asset, url, reason);

        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| fail("no document".to_string()))?;
        let head = document
            .head()
            .ok_or_else(|| fail("document has no <head>".to_string()))?;

        let element: Element = match asset {
            AssetKind::Stylesheet => {
                let link: HtmlLinkElement = document
                    .create_element("link")
                    .map_err(|e| fail(js_reason(e)))?
                    .dyn_into()
                    .map_err(|_| fail("<link> is not an HtmlLinkElement".to_string()))?;
                link.set_rel("stylesheet");
                link.set_href(url);
                link.into()
            }
            AssetKind::Library | AssetKind::Plugin => {
                let script: HtmlScriptElement = document
                    .create_element("script")
                    .map_err(|e| fail(js_reason(e)))?
                    .dyn_into()
                    .map_err(|_| fail("<script> is not an HtmlScriptElement".to_string()))?;
                script.set_src(url);
                script.set_async(false);
                script.into()
            }
        };

        let (tx, rx) = oneshot::channel::<Result<(), String>>();
        let tx = Rc::new(RefCell::new(Some(tx)));

        let on_load = {
            let tx = tx.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Ok(()));
                }
            })
        };
        let on_error = {
            let tx = tx.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Err("network or script error".to_string()));
                }
            })
        };

        element
            .add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())
            .map_err(|e| fail(js_reason(e)))?;
        element
            .add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())
            .map_err(|e| fail(js_reason(e)))?;
        head.append_child(&element).map_err(|e| fail(js_reason(e)))?;

        let outcome = rx
            .await
            .unwrap_or_else(|_| Err("load listener dropped".to_string()));

        let _ = element
            .remove_event_listener_with_callback("load", on_load.as_ref().unchecked_ref());
        let _ = element
            .remove_event_listener_with_callback("error", on_error.as_ref().unchecked_ref());

        outcome.map_err(|reason| fail(reason))?;

        // A plugin loaded without its library does not raise an error event
        match asset {
            AssetKind::Library if !namespace_present(false) => {
                Err(fail(format!("window.{} missing after load", LIBRARY_GLOBAL)))
            }
            AssetKind::Plugin if !namespace_present(true) => Err(fail(format!(
                "window.{}.{} missing after load",
                LIBRARY_GLOBAL, PLUGIN_NAMESPACE
            ))),
            _ => Ok(()),
        }
    }
}
