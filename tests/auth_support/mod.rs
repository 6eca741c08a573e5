#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use orbital::auth::{
    AuthError, DeviceAuthorization, DeviceFlowEndpoint, PollEvent, PollEventSink, StorageError,
    TokenGrant, TokenPollResponse, TokenRecord, TokenStore,
};

#[derive(Default)]
pub struct InMemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: TokenRecord) {
        *self.record.lock().expect("store lock poisoned") = Some(record);
    }
}

impl TokenStore for InMemoryTokenStore {
    fn write(&self, grant: &TokenGrant) -> Result<TokenRecord, StorageError> {
        let record = TokenRecord::issue(grant, Utc::now());
        *self.record.lock().expect("store lock poisoned") = Some(record.clone());
        Ok(record)
    }

    fn read(&self) -> Option<TokenRecord> {
        self.record.lock().expect("store lock poisoned").clone()
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.record.lock().expect("store lock poisoned").take();
        Ok(())
    }
}

/// Store whose writes always fail, as on a read-only home directory.
pub struct FailingTokenStore;

impl TokenStore for FailingTokenStore {
    fn write(&self, _grant: &TokenGrant) -> Result<TokenRecord, StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only file system",
        )))
    }

    fn read(&self) -> Option<TokenRecord> {
        None
    }

    fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Token endpoint that replays a fixed script of responses.
///
/// Once the script runs out every further poll reports `Pending`.
#[derive(Default)]
pub struct ScriptedEndpoint {
    responses: Mutex<VecDeque<Result<TokenPollResponse, AuthError>>>,
    polls: AtomicU32,
}

impl ScriptedEndpoint {
    pub fn new(responses: Vec<Result<TokenPollResponse, AuthError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            polls: AtomicU32::new(0),
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceFlowEndpoint for ScriptedEndpoint {
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
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(Ok(TokenPollResponse::Pending))
    }
}

pub fn authorization(interval: u64, expires_in: u64) -> DeviceAuthorization {
    serde_json::from_value(serde_json::json!({
        "device_code": "device-code-1",
        "user_code": "ABCD-EFGH",
        "verification_uri": "http://localhost:3005/device",
        "expires_in": expires_in,
        "interval": interval
    }))
    .expect("device authorization fixture")
}

pub fn grant(access_token: &str, expires_in: Option<u64>) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: None,
        token_type: Some("Bearer".to_string()),
        scope: Some("openid profile email".to_string()),
        expires_in,
    }
}

/// Sink that records every event for later assertions.
pub fn recording_sink() -> (PollEventSink, Arc<Mutex<Vec<PollEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: PollEventSink = Arc::new(move |event| {
        captured.lock().expect("events lock poisoned").push(event);
    });
    (sink, events)
}
