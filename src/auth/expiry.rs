//! Token freshness checks.

use chrono::{DateTime, Duration, Utc};

use super::token::TokenRecord;

/// Remaining lifetime, in seconds, below which a token is treated as unusable.
pub const SAFETY_MARGIN_SECS: i64 = 300;

fn safety_margin() -> Duration {
    Duration::seconds(SAFETY_MARGIN_SECS)
}

/// Whether `record` should be considered expired at `now`.
///
/// Absent records and records without an expiry are expired. A record with
/// exactly [`SAFETY_MARGIN_SECS`] left is expired as well.
pub fn is_expired_at(record: Option<&TokenRecord>, now: DateTime<Utc>) -> bool {
    let Some(expires_at) = record.and_then(|r| r.expires_at) else {
        return true;
    };
    expires_at - now <= safety_margin()
}

/// [`is_expired_at`] against the system clock.
pub fn is_expired(record: Option<&TokenRecord>) -> bool {
    is_expired_at(record, Utc::now())
}

/// Classification of whatever the token store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    LoggedOut,
    Expired(TokenRecord),
    Active(TokenRecord),
}

impl LoginStatus {
    pub fn evaluate(record: Option<TokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => Self::LoggedOut,
            Some(record) if is_expired_at(Some(&record), now) => Self::Expired(record),
            Some(record) => Self::Active(record),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}
