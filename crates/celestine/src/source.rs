//! External feed clients.
//!
//! [`SourceClient`] is the shared rate-limited JSON client; [`binance`] and
//! [`celestials`] put typed APIs on top and expose them behind the narrow
//! [`CandleSource`] and [`ChangeSource`] traits the sync jobs depend on.

pub mod binance;
pub mod celestials;
mod client;
mod errors;
mod rate_limit;

pub use binance::{BinanceApi, Candle, CandleSource, Interval, OhlcArgs};
pub use celestials::{CelestialsApi, Change, ChangeSource, Changes, ChangesRequest};
pub use client::{DEFAULT_TIMEOUT, SourceClient, SourceConfig};
pub use errors::{Result, SourceError};
pub use rate_limit::{DEFAULT_RPS, RateLimiter};
