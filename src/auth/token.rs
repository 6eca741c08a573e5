use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Successful token-endpoint payload, before it is anchored to a clock.
///
/// # Example
/// ```
/// use orbital::auth::TokenGrant;
///
/// let grant: TokenGrant = serde_json::from_str(
///     r#"{"access_token":"at","token_type":"Bearer","expires_in":3600}"#,
/// )?;
/// assert_eq!(grant.expires_in, Some(3600));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Credential record persisted by a token store.
///
/// `expires_at` is always absolute; it is computed once when the record is
/// issued and never stored as a relative duration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Anchor a grant to `now`.
    pub fn issue(grant: &TokenGrant, now: DateTime<Utc>) -> Self {
        let expires_at = grant
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| now + Duration::seconds(secs));
        Self {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            token_type: grant
                .token_type
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(default_token_type),
            scope: grant.scope.clone().unwrap_or_default(),
            expires_at,
            created_at: now,
        }
    }

    /// Leading characters of the access token, for display.
    pub fn preview(&self) -> String {
        let head: String = self.access_token.chars().take(8).collect();
        format!("{head}...")
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}
