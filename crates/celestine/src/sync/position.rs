use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ordering value a sync job can checkpoint.
///
/// Checkpoints are stored as a plain `i64`; each position type defines its
/// own lossless mapping onto it. The mapping must preserve order.
pub trait SyncPosition: Copy + Ord + Send + Sync + fmt::Debug + fmt::Display + 'static {
    fn to_stored(&self) -> i64;

    fn from_stored(value: i64) -> Result<Self, String>;
}

/// Monotonic id of an entry in a change log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeId(pub i64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SyncPosition for ChangeId {
    fn to_stored(&self) -> i64 {
        self.0
    }

    fn from_stored(value: i64) -> Result<Self, String> {
        if value < 0 {
            return Err(format!("change id must not be negative, got {value}"));
        }
        Ok(Self(value))
    }
}

/// Wall-clock positions are stored as Unix seconds.
impl SyncPosition for DateTime<Utc> {
    fn to_stored(&self) -> i64 {
        self.timestamp()
    }

    fn from_stored(value: i64) -> Result<Self, String> {
        DateTime::from_timestamp(value, 0).ok_or_else(|| format!("timestamp out of range: {value}"))
    }
}
