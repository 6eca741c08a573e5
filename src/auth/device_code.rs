//! Device authorization request/response types and the endpoint seam.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;

use super::error::AuthError;
use super::token::TokenGrant;

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Result of a device authorization request.
///
/// Lives for one login attempt only. `device_code` is a server secret: it is
/// redacted from `Debug` output and must never be logged or persisted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// When the response was decoded; `expires_in` counts from here.
    #[serde(skip, default = "Instant::now")]
    pub received_at: Instant,
}

impl DeviceAuthorization {
    /// URL to hand to a browser: the pre-filled one when the server sent it.
    pub fn browser_uri(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    /// Instant after which the device code is no longer worth polling.
    pub fn deadline(&self) -> Instant {
        self.received_at + self.lifetime()
    }
}

impl fmt::Debug for DeviceAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAuthorization")
            .field("device_code", &"<redacted>")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("verification_uri_complete", &self.verification_uri_complete)
            .field("expires_in", &self.expires_in)
            .field("interval", &self.interval)
            .finish()
    }
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// RFC 8628 error codes the poller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceFlowErrorCode {
    AuthorizationPending,
    SlowDown,
    AccessDenied,
    ExpiredToken,
}

/// RFC 6749 error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// One classified answer from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPollResponse {
    Granted(TokenGrant),
    Pending,
    SlowDown,
    AccessDenied,
    ExpiredToken,
    Failed {
        error: String,
        description: Option<String>,
    },
}

impl TokenPollResponse {
    pub fn from_error(body: OAuthErrorBody) -> Self {
        match DeviceFlowErrorCode::from_str(&body.error) {
            Ok(DeviceFlowErrorCode::AuthorizationPending) => Self::Pending,
            Ok(DeviceFlowErrorCode::SlowDown) => Self::SlowDown,
            Ok(DeviceFlowErrorCode::AccessDenied) => Self::AccessDenied,
            Ok(DeviceFlowErrorCode::ExpiredToken) => Self::ExpiredToken,
            Err(_) => Self::Failed {
                error: body.error,
                description: body.error_description,
            },
        }
    }
}

/// Authorization-server operations the CLI side of the flow depends on.
#[async_trait]
pub trait DeviceFlowEndpoint: Send + Sync {
    /// Obtain a device code, user code and polling parameters.
    async fn request_device_code(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<DeviceAuthorization, AuthError>;

    /// Exchange the device code once. Protocol errors are `Ok`; only
    /// transport and malformed responses are `Err`.
    async fn poll_token(
        &self,
        client_id: &str,
        device_code: &str,
    ) -> Result<TokenPollResponse, AuthError>;
}
