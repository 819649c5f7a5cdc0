//! Time-sortable identifiers
//!
//! Identifiers are 128-bit UUIDv7 values: a 48-bit millisecond timestamp
//! followed by random bits. Rendered as lowercase hyphenated hex, their
//! lexicographic order follows the embedded timestamp, so records keyed by
//! them range-scan in creation (or issue) order.

use crate::core::error::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::{NoContext, Timestamp, Uuid};

/// Largest millisecond timestamp a UUIDv7 can carry
const MAX_TIMESTAMP_MILLIS: i64 = (1 << 48) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortableId(Uuid);

impl SortableId {
    /// Identifier stamped with the current time
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Identifier stamped with a caller-supplied instant, e.g. an invoice's
    /// issue date. Instants outside the 48-bit millisecond range (before the
    /// Unix epoch, or after year 10889) cannot be encoded.
    pub fn from_datetime(at: DateTime<Utc>) -> BillingResult<Self> {
        if at.timestamp_millis() > MAX_TIMESTAMP_MILLIS {
            return Err(BillingError::invalid(
                "identifier",
                "timestamp",
                format!("{} is beyond the 48-bit millisecond range", at),
            ));
        }
        let secs = u64::try_from(at.timestamp()).map_err(|_| {
            BillingError::invalid("identifier", "timestamp", format!("{} precedes the epoch", at))
        })?;
        let ts = Timestamp::from_unix(NoContext, secs, at.timestamp_subsec_nanos());
        Ok(Self(Uuid::new_v7(ts)))
    }

    /// Millisecond timestamp embedded in the identifier
    pub fn timestamp_millis(&self) -> u64 {
        match self.0.get_timestamp() {
            Some(ts) => {
                let (secs, nanos) = ts.to_unix();
                secs * 1000 + u64::from(nanos) / 1_000_000
            }
            None => 0,
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SortableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SortableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for SortableId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
