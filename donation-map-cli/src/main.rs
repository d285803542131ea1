use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use donation_map::{
    assets::HttpAssetHost, AssetLoader, GeoPoint, Geocoder, MapLayerConfig, NominatimGeocoder,
};

/// Exercise the donation map geocoder and asset loader from a terminal.
///
/// Set RUST_LOG=debug for more detail.
#[derive(Parser, Debug)]
#[command(name = "donation-map")]
#[command(version, about)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// JSON map layer config (defaults to the public OpenStreetMap services)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Look up the coordinate of a place
    Forward {
        /// Place name; several words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        place: Vec<String>,
    },
    /// Look up the address at a coordinate
    #[command(allow_negative_numbers = true)]
    Reverse {
        #[arg(value_parser = parse_latitude)]
        latitude: f64,
        #[arg(value_parser = parse_longitude)]
        longitude: f64,
    },
    /// Fetch the map library, stylesheet and plugin in order
    Assets,
}

fn parse_degrees(value: &str, limit: f64) -> Result<f64, String> {
    let degrees: f64 = value
        .parse()
        .map_err(|_| format!("{:?} is not a number", value))?;
    if !degrees.is_finite() || degrees.abs() > limit {
        return Err(format!("{} is outside -{}..={}", degrees, limit, limit));
    }
    Ok(degrees)
}

fn parse_latitude(value: &str) -> Result<f64, String> {
    parse_degrees(value, 90.0)
}

fn parse_longitude(value: &str) -> Result<f64, String> {
    parse_degrees(value, 180.0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    donation_map::init_debug_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MapLayerConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MapLayerConfig::default(),
    };

    match cli.command {
        Command::Forward { place } => {
            let place = place.join(" ");
            let geocoder = NominatimGeocoder::new(&config.geocoder)?;
            match geocoder.forward(&place).await? {
                Some(point) => println!("{}", point),
                None => bail!("no match for {:?}", place),
            }
        }
        Command::Reverse {
            latitude,
            longitude,
        } => {
            let point = GeoPoint::new(latitude, longitude);
            let geocoder = NominatimGeocoder::new(&config.geocoder)?;
            match geocoder.reverse(point).await? {
                Some(address) => println!("{}", address),
                None => bail!("no address at {}", point),
            }
        }
        Command::Assets => {
            let host = Arc::new(HttpAssetHost::new(&config.geocoder.user_agent)?);
            let loader = AssetLoader::new(host.clone(), config.assets.clone());
            loader.ensure_ready().await?;
            for url in [
                &config.assets.stylesheet_url,
                &config.assets.library_url,
                &config.assets.plugin_url,
            ] {
                let size = host.asset(url).map(|body| body.len()).unwrap_or(0);
                println!("{:>9} bytes  {}", size, url);
            }
            log::info!("asset load finished in state {:?}", loader.state());
        }
    }

    Ok(())
}
