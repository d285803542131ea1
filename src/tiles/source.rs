use crate::core::{config::TileConfig, geo::TileCoord};

/// Anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;

    /// Attribution the provider's terms require to be displayed with its tiles.
    fn attribution(&self) -> &str;

    fn max_zoom(&self) -> u8;
}

/// `{s}/{z}/{x}/{y}` URL template source; the default points at OpenStreetMap.
#[derive(Debug, Clone)]
pub struct TemplateTileSource {
    template: String,
    subdomains: Vec<String>,
    attribution: String,
    max_zoom: u8,
}

impl TemplateTileSource {
    pub fn new(config: &TileConfig) -> Self {
        Self {
            template: config.url_template.clone(),
            subdomains: config.subdomains.clone(),
            attribution: config.attribution.clone(),
            max_zoom: config.max_zoom,
        }
    }

    pub fn openstreetmap() -> Self {
        Self::new(&TileConfig::default())
    }
}

impl Default for TemplateTileSource {
    fn default() -> Self {
        Self::openstreetmap()
    }
}

impl TileSource for TemplateTileSource {
    fn url(&self, coord: TileCoord) -> String {
        let subdomain = if self.subdomains.is_empty() {
            ""
        } else {
            let idx = ((coord.x + coord.y) % self.subdomains.len() as u32) as usize;
            self.subdomains[idx].as_str()
        };

        self.template
            .replace("{s}", subdomain)
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    fn attribution(&self) -> &str {
        &self.attribution
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osm_url_rotates_subdomains() {
        let source = TemplateTileSource::openstreetmap();
        assert_eq!(
            source.url(TileCoord::new(0, 0, 1)),
            "https://a.tile.openstreetmap.org/1/0/0.png"
        );
        assert_eq!(
            source.url(TileCoord::new(1, 0, 1)),
            "https://b.tile.openstreetmap.org/1/1/0.png"
        );
        assert!(source.attribution().contains("OpenStreetMap"));
    }

    #[test]
    fn test_template_without_subdomains() {
        let source = TemplateTileSource::new(&TileConfig {
            url_template: "http://tiles.local/{z}/{x}/{y}.png".into(),
            subdomains: Vec::new(),
            attribution: "local".into(),
            max_zoom: 16,
        });
        assert_eq!(
            source.url(TileCoord::new(3, 5, 4)),
            "http://tiles.local/4/3/5.png"
        );
        assert_eq!(source.max_zoom(), 16);
    }
}
