//! Concrete sync jobs.

pub mod celestials;
pub mod price;

pub use celestials::{CelestialJob, CelestialJobConfig, IDENTITY_JOB_NAME};
pub use price::{PRICE_JOB_NAME, PriceJob, PriceJobConfig};
