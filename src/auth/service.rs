use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::device_code::{DeviceAuthorization, DeviceFlowEndpoint};
use super::error::{AuthError, StorageError};
use super::expiry::LoginStatus;
use super::poller::{PollEventSink, PollOutcome, TokenPoller};
use super::store::TokenStore;
use super::token::TokenRecord;
use crate::error::OrbitalError;

/// Device-flow facade: request, poll, persist.
///
/// All I/O decisions (printing, prompting, exit codes) belong to the caller.
/// `AuthService` only returns typed results and errors.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use orbital::auth::{AuthService, FileTokenStore, HttpAuthServer, TokenStoreConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), orbital::error::OrbitalError> {
/// let store = Arc::new(FileTokenStore::new(TokenStoreConfig::new("/tmp/orbital".into())));
/// let server = Arc::new(HttpAuthServer::new("http://localhost:3005")?);
/// let svc = AuthService::new(server, store, "my-client");
///
/// let authorization = svc.start_login("openid profile email").await?;
/// println!("Enter {} at {}", authorization.user_code, authorization.verification_uri);
/// let record = svc
///     .complete_login(&authorization, &CancellationToken::new(), None)
///     .await?;
/// println!("expires at {:?}", record.expires_at);
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    endpoint: Arc<dyn DeviceFlowEndpoint>,
    store: Arc<dyn TokenStore>,
    client_id: String,
}

impl AuthService {
    pub fn new(
        endpoint: Arc<dyn DeviceFlowEndpoint>,
        store: Arc<dyn TokenStore>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            store,
            client_id: client_id.into(),
        }
    }

    /// Classify the stored credential.
    pub fn status(&self) -> LoginStatus {
        LoginStatus::evaluate(self.store.read(), Utc::now())
    }

    /// The stored credential, if it is still usable.
    pub fn require_active(&self) -> Result<TokenRecord, OrbitalError> {
        require_active(self.store.as_ref())
    }

    /// Ask the server for a device code. Not retried.
    pub async fn start_login(&self, scope: &str) -> Result<DeviceAuthorization, AuthError> {
        self.endpoint
            .request_device_code(&self.client_id, scope)
            .await
    }

    /// Poll until the authorization settles and store the token on approval.
    ///
    /// Nothing is written unless the server approved the request.
    pub async fn complete_login(
        &self,
        authorization: &DeviceAuthorization,
        cancel: &CancellationToken,
        event_sink: Option<PollEventSink>,
    ) -> Result<TokenRecord, OrbitalError> {
        let mut poller = TokenPoller::new(self.endpoint.clone(), self.client_id.clone());
        if let Some(sink) = event_sink {
            poller = poller.with_event_sink(sink);
        }

        match poller.run(authorization, cancel).await {
            PollOutcome::Approved(grant) => {
                let record = self.store.write(&grant)?;
                tracing::info!(attempts = poller.attempts(), "device authorization approved");
                Ok(record)
            }
            PollOutcome::Denied => Err(OrbitalError::AccessDenied),
            PollOutcome::Expired { .. } => Err(OrbitalError::DeviceCodeExpired),
            PollOutcome::Error(reason) => Err(OrbitalError::Authorization(reason)),
            PollOutcome::Cancelled => Err(OrbitalError::Cancelled),
        }
    }

    /// Remove the stored credential. Succeeds when already logged out.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.store.clear()
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }
}

/// Return the stored record when it exists and is outside the safety margin.
pub fn require_active(store: &dyn TokenStore) -> Result<TokenRecord, OrbitalError> {
    match LoginStatus::evaluate(store.read(), Utc::now()) {
        LoginStatus::Active(record) => Ok(record),
        LoginStatus::Expired(_) => Err(OrbitalError::SessionExpired),
        LoginStatus::LoggedOut => Err(OrbitalError::NotLoggedIn),
    }
}
