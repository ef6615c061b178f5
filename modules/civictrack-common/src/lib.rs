pub mod config;
pub mod error;
pub mod geo;
pub mod types;
pub mod validation;

pub use config::Config;
pub use error::{CivicError, CivicResult};
pub use geo::haversine_km;
pub use types::*;
pub use validation::*;
