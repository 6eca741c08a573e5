mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orbital::auth::{
    AuthError, AuthService, DeviceAuthorization, DeviceFlowEndpoint, PollEvent, PollOutcome,
    PollState, TokenPollResponse, TokenPoller, TokenStore,
};
use orbital::error::OrbitalError;
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use auth_support::{
    authorization, grant, recording_sink, FailingTokenStore, InMemoryTokenStore, ScriptedEndpoint,
};

fn assert_elapsed(start: Instant, secs: u64) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
        "expected ~{secs}s, got {elapsed:?}"
    );
}

/// Endpoint whose token requests never complete.
struct HangingEndpoint;

#[async_trait]
impl DeviceFlowEndpoint for HangingEndpoint {
    async fn request_device_code(
        &self,
        _client_id: &str,
        _scope: &str,
    ) -> Result<DeviceAuthorization, AuthError> {
        Ok(authorization(5, 900))
    }

    async fn poll_token(
        &self,
        _client_id: &str,
        _device_code: &str,
    ) -> Result<TokenPollResponse, AuthError> {
        std::future::pending().await
    }
}

/// Endpoint that grants a token, but only after `delay`.
struct SlowGrantEndpoint {
    delay: Duration,
}

#[async_trait]
impl DeviceFlowEndpoint for SlowGrantEndpoint {
    async fn request_device_code(
        &self,
        _client_id: &str,
        _scope: &str,
    ) -> Result<DeviceAuthorization, AuthError> {
        Ok(authorization(5, 900))
    }

    async fn poll_token(
        &self,
        _client_id: &str,
        _device_code: &str,
    ) -> Result<TokenPollResponse, AuthError> {
        tokio::time::sleep(self.delay).await;
        Ok(TokenPollResponse::Granted(grant("late", Some(3600))))
    }
}

#[tokio::test(start_paused = true)]
async fn first_request_waits_one_interval() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(TokenPollResponse::Granted(
        grant("at-1", Some(3600)),
    ))]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");

    let start = Instant::now();
    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    assert_eq!(outcome, PollOutcome::Approved(grant("at-1", Some(3600))));
    assert_eq!(endpoint.polls(), 1);
    assert_elapsed(start, 5);
}

#[tokio::test(start_paused = true)]
async fn slow_down_grows_interval_and_keeps_polling() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![
        Ok(TokenPollResponse::Pending),
        Ok(TokenPollResponse::Pending),
        Ok(TokenPollResponse::SlowDown),
        Ok(TokenPollResponse::Granted(grant("at-2", Some(3600)))),
    ]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");

    let start = Instant::now();
    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    assert!(matches!(outcome, PollOutcome::Approved(_)));
    assert_eq!(endpoint.polls(), 4);
    assert_eq!(poller.attempts(), 4);
    assert_eq!(poller.interval(), Duration::from_secs(10));
    // 5 + 5 + 5, then one 10 second wait after slow_down.
    assert_elapsed(start, 25);
}

#[tokio::test(start_paused = true)]
async fn interval_below_floor_is_raised() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(TokenPollResponse::Granted(
        grant("at", None),
    ))]));
    let mut poller = TokenPoller::new(endpoint, "cli");

    let start = Instant::now();
    poller
        .run(&authorization(1, 900), &CancellationToken::new())
        .await;

    assert_eq!(poller.interval(), Duration::from_secs(5));
    assert_elapsed(start, 5);
}

#[tokio::test(start_paused = true)]
async fn server_interval_above_floor_is_kept() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(TokenPollResponse::Granted(
        grant("at", None),
    ))]));
    let mut poller = TokenPoller::new(endpoint, "cli");

    let start = Instant::now();
    poller
        .run(&authorization(8, 900), &CancellationToken::new())
        .await;

    assert_elapsed(start, 8);
}

#[tokio::test(start_paused = true)]
async fn access_denied_is_terminal() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![
        Ok(TokenPollResponse::Pending),
        Ok(TokenPollResponse::AccessDenied),
    ]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");

    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    assert_eq!(outcome, PollOutcome::Denied);
    assert_eq!(endpoint.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_token_from_server_is_terminal() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(
        TokenPollResponse::ExpiredToken,
    )]));
    let mut poller = TokenPoller::new(endpoint, "cli");

    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        PollOutcome::Expired {
            reported_by_server: true
        }
    );
}

#[tokio::test(start_paused = true)]
async fn lifetime_ceiling_stops_without_extra_request() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");

    let start = Instant::now();
    let outcome = poller
        .run(&authorization(5, 12), &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        PollOutcome::Expired {
            reported_by_server: false
        }
    );
    // Polls at 5s and 10s; the 15s wake-up is past the 12s lifetime.
    assert_eq!(endpoint.polls(), 2);
    assert_elapsed(start, 12);
}

#[tokio::test(start_paused = true)]
async fn grant_arriving_after_lifetime_is_expired() {
    let endpoint = Arc::new(SlowGrantEndpoint {
        delay: Duration::from_secs(20),
    });
    let (sink, events) = recording_sink();
    let mut poller = TokenPoller::new(endpoint, "cli").with_event_sink(sink);

    let start = Instant::now();
    let outcome = poller
        .run(&authorization(5, 12), &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        PollOutcome::Expired {
            reported_by_server: false
        }
    );
    assert_eq!(poller.attempts(), 1);
    assert_elapsed(start, 12);
    let last = events.lock().unwrap().last().cloned();
    assert!(matches!(
        last,
        Some(PollEvent::Finished {
            state: PollState::Expired,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_login_after_lifetime_stores_nothing() {
    let store = Arc::new(InMemoryTokenStore::new());
    let svc = AuthService::new(
        Arc::new(SlowGrantEndpoint {
            delay: Duration::from_secs(20),
        }),
        store.clone(),
        "cli",
    );

    let result = svc
        .complete_login(&authorization(5, 12), &CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(OrbitalError::DeviceCodeExpired)));
    assert!(store.read().is_none());
}

#[tokio::test(start_paused = true)]
async fn lifetime_counts_from_authorization_receipt() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");

    let start = Instant::now();
    let authorization = authorization(5, 12);
    // Time spent showing instructions before polling starts.
    tokio::time::sleep(Duration::from_secs(4)).await;
    let outcome = poller.run(&authorization, &CancellationToken::new()).await;

    assert_eq!(outcome.state(), PollState::Expired);
    // One poll at 9s; the 14s wake-up is past the 12s lifetime.
    assert_eq!(endpoint.polls(), 1);
    assert_elapsed(start, 12);
}

#[tokio::test(start_paused = true)]
async fn unknown_error_code_uses_description() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(TokenPollResponse::Failed {
        error: "invalid_grant".to_string(),
        description: Some("device code already used".to_string()),
    })]));
    let mut poller = TokenPoller::new(endpoint, "cli");

    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        PollOutcome::Error("device code already used".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_ends_in_error() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![
        Ok(TokenPollResponse::Pending),
        Err(AuthError::Network("connection reset".to_string())),
        Ok(TokenPollResponse::Granted(grant("never", None))),
    ]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");

    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    match outcome {
        PollOutcome::Error(reason) => assert!(reason.contains("connection reset")),
        other => panic!("expected Error, got {other:?}"),
    }
    assert_eq!(endpoint.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_request_times_out() {
    let mut poller = TokenPoller::new(Arc::new(HangingEndpoint), "cli");

    let start = Instant::now();
    let outcome = poller
        .run(&authorization(5, 900), &CancellationToken::new())
        .await;

    assert_eq!(outcome.state(), PollState::Error);
    assert_elapsed(start, 35);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_between_polls() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![]));
    let mut poller = TokenPoller::new(endpoint.clone(), "cli");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let outcome = poller.run(&authorization(5, 900), &cancel).await;

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(endpoint.polls(), 1);
    assert_elapsed(start, 7);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_request() {
    let mut poller = TokenPoller::new(Arc::new(HangingEndpoint), "cli");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(6)).await;
        trigger.cancel();
    });

    let outcome = poller.run(&authorization(5, 900), &cancel).await;

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(poller.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn events_trace_the_run() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![
        Ok(TokenPollResponse::SlowDown),
        Ok(TokenPollResponse::AccessDenied),
    ]));
    let (sink, events) = recording_sink();
    let mut poller = TokenPoller::new(endpoint, "cli").with_event_sink(sink);

    poller
        .run(&authorization(5, 600), &CancellationToken::new())
        .await;

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            PollEvent::Started {
                interval: Duration::from_secs(5),
                expires_in: Duration::from_secs(600),
            },
            PollEvent::Polled {
                attempt: 1,
                state: PollState::Pending,
            },
            PollEvent::SlowedDown {
                interval: Duration::from_secs(10),
            },
            PollEvent::Finished {
                state: PollState::Denied,
                reason: Some("access denied by user".to_string()),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn approved_login_is_persisted() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![
        Ok(TokenPollResponse::Pending),
        Ok(TokenPollResponse::Granted(grant("at-approved", Some(3600)))),
    ]));
    let store = Arc::new(InMemoryTokenStore::new());
    let svc = AuthService::new(endpoint, store.clone(), "cli");

    let authorization = svc.start_login("openid").await.unwrap();
    let record = svc
        .complete_login(&authorization, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(record.access_token, "at-approved");
    assert_eq!(store.read(), Some(record));
    assert!(svc.status().is_active());
}

#[tokio::test(start_paused = true)]
async fn denied_login_writes_nothing() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(
        TokenPollResponse::AccessDenied,
    )]));
    let store = Arc::new(InMemoryTokenStore::new());
    let svc = AuthService::new(endpoint, store.clone(), "cli");

    let result = svc
        .complete_login(&authorization(5, 900), &CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(OrbitalError::AccessDenied)));
    assert!(store.read().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_token_write_is_storage_error() {
    let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(TokenPollResponse::Granted(
        grant("at", Some(3600)),
    ))]));
    let svc = AuthService::new(endpoint, Arc::new(FailingTokenStore), "cli");

    let result = svc
        .complete_login(&authorization(5, 900), &CancellationToken::new(), None)
        .await;

    let err = result.expect_err("write failure must surface");
    assert!(matches!(err, OrbitalError::Storage(_)));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_and_cancelled_logins_map_to_errors() {
    let store = Arc::new(InMemoryTokenStore::new());

    let svc = AuthService::new(Arc::new(ScriptedEndpoint::new(vec![])), store.clone(), "cli");
    let expired = svc
        .complete_login(&authorization(5, 7), &CancellationToken::new(), None)
        .await;
    assert!(matches!(expired, Err(OrbitalError::DeviceCodeExpired)));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let cancelled = svc
        .complete_login(&authorization(5, 900), &cancel, None)
        .await;
    assert!(matches!(cancelled, Err(OrbitalError::Cancelled)));
    assert!(store.read().is_none());
}
