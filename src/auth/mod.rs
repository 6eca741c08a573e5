//! OAuth 2.0 device authorization grant: requester, poller, token storage and
//! the approval-side verifier.

pub mod approval;
pub mod device_code;
pub mod error;
pub mod expiry;
pub mod http;
pub mod poller;
pub mod service;
pub mod store;
pub mod token;

pub use approval::{
    ApprovalAction, ApprovalEndpoint, ApprovalError, CodeLookup, Decision, DecisionResponse,
    DeviceVerifier, UserCode, Verification,
};
pub use device_code::{DeviceAuthorization, DeviceFlowEndpoint, TokenPollResponse};
pub use error::{AuthError, StorageError};
pub use expiry::{is_expired, is_expired_at, LoginStatus, SAFETY_MARGIN_SECS};
pub use http::{HttpAuthServer, SessionUser};
pub use poller::{PollEvent, PollEventSink, PollOutcome, PollState, TokenPoller};
pub use service::{require_active, AuthService};
pub use store::{FileTokenStore, TokenStore, TokenStoreConfig};
pub use token::{TokenGrant, TokenRecord};
