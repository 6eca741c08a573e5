//! Token polling state machine for the device authorization grant.
//!
//! The poller waits one interval before every request, reacts to the RFC 8628
//! error codes, and stops in exactly one terminal [`PollState`]. It never
//! prints: progress is published as [`PollEvent`]s to an optional sink.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::device_code::{DeviceAuthorization, DeviceFlowEndpoint, TokenPollResponse};
use super::token::TokenGrant;
use crate::util::timeout::with_timeout;

/// Lower bound for the polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Added to the interval on every `slow_down`.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);
/// Upper bound for a single token request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Poller state. Everything except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PollState {
    Pending,
    Approved,
    Denied,
    Expired,
    Error,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Terminal result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Approved(TokenGrant),
    Denied,
    /// `reported_by_server` is false when the client-side ceiling fired.
    Expired { reported_by_server: bool },
    Error(String),
    Cancelled,
}

impl PollOutcome {
    pub fn state(&self) -> PollState {
        match self {
            Self::Approved(_) => PollState::Approved,
            Self::Denied => PollState::Denied,
            Self::Expired { .. } => PollState::Expired,
            Self::Error(_) => PollState::Error,
            Self::Cancelled => PollState::Cancelled,
        }
    }

    fn reason(&self) -> Option<String> {
        match self {
            Self::Approved(_) => None,
            Self::Denied => Some("access denied by user".to_string()),
            Self::Expired {
                reported_by_server: true,
            } => Some("device code expired".to_string()),
            Self::Expired {
                reported_by_server: false,
            } => Some("device code lifetime elapsed".to_string()),
            Self::Error(reason) => Some(reason.clone()),
            Self::Cancelled => Some("cancelled by operator".to_string()),
        }
    }
}

/// State transitions published while polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollEvent {
    Started {
        interval: Duration,
        expires_in: Duration,
    },
    Polled {
        attempt: u32,
        state: PollState,
    },
    SlowedDown {
        interval: Duration,
    },
    Finished {
        state: PollState,
        reason: Option<String>,
    },
}

/// Callback receiving [`PollEvent`]s.
pub type PollEventSink = Arc<dyn Fn(PollEvent) + Send + Sync>;

/// Drives the token endpoint until the authorization reaches a terminal state.
///
/// Requests are strictly sequential: the next tick is only scheduled after the
/// previous response has been classified.
pub struct TokenPoller {
    endpoint: Arc<dyn DeviceFlowEndpoint>,
    client_id: String,
    interval: Duration,
    attempts: u32,
    event_sink: Option<PollEventSink>,
}

impl TokenPoller {
    pub fn new(endpoint: Arc<dyn DeviceFlowEndpoint>, client_id: impl Into<String>) -> Self {
        Self {
            endpoint,
            client_id: client_id.into(),
            interval: MIN_POLL_INTERVAL,
            attempts: 0,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: PollEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Current interval; grows by [`SLOW_DOWN_INCREMENT`] on each `slow_down`.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Requests issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Poll until approval, denial, expiry, failure or cancellation.
    ///
    /// The lifetime ceiling is [`DeviceAuthorization::deadline`], counted from
    /// when the authorization response was received. When the next wake-up
    /// would land at or past it, the poller waits out the remaining time and
    /// reports `Expired` without another request. A request still in flight
    /// at the deadline is abandoned and the run also ends `Expired`.
    pub async fn run(
        &mut self,
        authorization: &DeviceAuthorization,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        self.interval = Duration::from_secs(authorization.interval).max(MIN_POLL_INTERVAL);
        self.attempts = 0;
        let deadline = authorization.deadline();
        self.emit(PollEvent::Started {
            interval: self.interval,
            expires_in: authorization.lifetime(),
        });

        let outcome = loop {
            let wake = Instant::now() + self.interval;
            let ceiling_hit = wake >= deadline;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break PollOutcome::Cancelled,
                _ = sleep_until(wake.min(deadline)) => {}
            }
            if ceiling_hit {
                tracing::debug!(attempts = self.attempts, "device code lifetime elapsed");
                break PollOutcome::Expired {
                    reported_by_server: false,
                };
            }

            self.attempts += 1;
            let request = with_timeout(
                REQUEST_TIMEOUT,
                self.endpoint
                    .poll_token(&self.client_id, &authorization.device_code),
            );
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => break PollOutcome::Cancelled,
                response = request => response,
                _ = sleep_until(deadline) => {
                    tracing::debug!(attempt = self.attempts, "device code lifetime elapsed mid-request");
                    break PollOutcome::Expired {
                        reported_by_server: false,
                    };
                }
            };

            match response {
                Ok(TokenPollResponse::Granted(grant)) => break PollOutcome::Approved(grant),
                Ok(TokenPollResponse::Pending) => {
                    tracing::debug!(attempt = self.attempts, "authorization pending");
                    self.emit(PollEvent::Polled {
                        attempt: self.attempts,
                        state: PollState::Pending,
                    });
                }
                Ok(TokenPollResponse::SlowDown) => {
                    self.interval += SLOW_DOWN_INCREMENT;
                    tracing::debug!(
                        attempt = self.attempts,
                        interval_secs = self.interval.as_secs(),
                        "server asked to slow down"
                    );
                    self.emit(PollEvent::Polled {
                        attempt: self.attempts,
                        state: PollState::Pending,
                    });
                    self.emit(PollEvent::SlowedDown {
                        interval: self.interval,
                    });
                }
                Ok(TokenPollResponse::AccessDenied) => break PollOutcome::Denied,
                Ok(TokenPollResponse::ExpiredToken) => {
                    break PollOutcome::Expired {
                        reported_by_server: true,
                    }
                }
                Ok(TokenPollResponse::Failed { error, description }) => {
                    break PollOutcome::Error(description.unwrap_or(error))
                }
                Err(err) => {
                    tracing::warn!(attempt = self.attempts, error = %err, "token poll failed");
                    break PollOutcome::Error(err.to_string());
                }
            }
        };

        self.emit(PollEvent::Finished {
            state: outcome.state(),
            reason: outcome.reason(),
        });
        outcome
    }

    fn emit(&self, event: PollEvent) {
        if let Some(sink) = &self.event_sink {
            sink(event);
        }
    }
}
