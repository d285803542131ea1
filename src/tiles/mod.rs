pub mod source;

pub use source::{TemplateTileSource, TileSource};
