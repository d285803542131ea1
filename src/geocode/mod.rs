//! Forward and reverse geocoding.

pub mod nominatim;
pub mod sequence;
pub mod service;

pub use nominatim::NominatimGeocoder;
pub use sequence::{RequestSequencer, Ticket};
pub use service::{bounded, Address, Geocoder, NetworkError};
