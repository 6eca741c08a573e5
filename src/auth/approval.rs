//! Approval side of the device flow: user-code handling and the calls a
//! signed-in browser or terminal makes to approve or deny a pending device.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::error::AuthError;

pub const USER_CODE_LEN: usize = 8;

/// Canonical user code: eight uppercase ASCII letters or digits, no separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserCode(String);

impl UserCode {
    /// Normalize operator input.
    ///
    /// Case is folded and every non-alphanumeric character (dashes, spaces)
    /// is dropped, so `"ab12 cd34"`, `"AB12-CD34"` and `"ab12cd34"` are the
    /// same code.
    ///
    /// ```
    /// use orbital::auth::UserCode;
    ///
    /// let code = UserCode::parse("ab12 cd34")?;
    /// assert_eq!(code.as_str(), "AB12CD34");
    /// assert_eq!(code.display(), "AB12-CD34");
    /// # Ok::<(), orbital::auth::ApprovalError>(())
    /// ```
    pub fn parse(input: &str) -> Result<Self, ApprovalError> {
        let canonical: String = input
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if canonical.len() != USER_CODE_LEN {
            return Err(ApprovalError::Malformed(input.trim().to_string()));
        }
        Ok(Self(canonical))
    }

    /// Form sent to the server.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `XXXX-XXXX` form shown to people.
    pub fn display(&self) -> String {
        let (head, tail) = self.0.split_at(USER_CODE_LEN / 2);
        format!("{head}-{tail}")
    }
}

impl fmt::Display for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("'{0}' is not a valid device code (expected XXXX-XXXX)")]
    Malformed(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// What the server knows about a user code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeLookup {
    Found { status: String },
    /// Unknown or expired; the server does not say which.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Deny,
}

/// Server answer to an approve/deny call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionResponse {
    Accepted,
    Rejected,
}

/// Authorization-server operations used by the approval side.
#[async_trait]
pub trait ApprovalEndpoint: Send + Sync {
    async fn lookup_user_code(&self, code: &UserCode) -> Result<CodeLookup, AuthError>;

    /// `session_token` authenticates the approving user.
    async fn decide(
        &self,
        code: &UserCode,
        action: ApprovalAction,
        session_token: &str,
    ) -> Result<DecisionResponse, AuthError>;
}

/// Outcome of checking a user code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Pending(UserCode),
    InvalidOrExpired,
}

/// Outcome of approving or denying a user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied,
    InvalidOrExpired,
}

/// Validates user codes against pending authorizations and records the
/// user's decision.
///
/// Unknown, expired and already-decided codes all come back as
/// `InvalidOrExpired` so callers cannot tell them apart.
pub struct DeviceVerifier {
    endpoint: Arc<dyn ApprovalEndpoint>,
}

impl DeviceVerifier {
    pub fn new(endpoint: Arc<dyn ApprovalEndpoint>) -> Self {
        Self { endpoint }
    }

    pub async fn verify(&self, input: &str) -> Result<Verification, ApprovalError> {
        let code = UserCode::parse(input)?;
        match self.endpoint.lookup_user_code(&code).await? {
            CodeLookup::Found { status } if status.eq_ignore_ascii_case("pending") => {
                Ok(Verification::Pending(code))
            }
            CodeLookup::Found { status } => {
                tracing::debug!(%status, "user code is no longer pending");
                Ok(Verification::InvalidOrExpired)
            }
            CodeLookup::NotFound => Ok(Verification::InvalidOrExpired),
        }
    }

    pub async fn approve(
        &self,
        input: &str,
        session_token: &str,
    ) -> Result<Decision, ApprovalError> {
        self.decide(input, ApprovalAction::Approve, session_token)
            .await
    }

    pub async fn deny(&self, input: &str, session_token: &str) -> Result<Decision, ApprovalError> {
        self.decide(input, ApprovalAction::Deny, session_token).await
    }

    async fn decide(
        &self,
        input: &str,
        action: ApprovalAction,
        session_token: &str,
    ) -> Result<Decision, ApprovalError> {
        let code = match self.verify(input).await? {
            Verification::Pending(code) => code,
            Verification::InvalidOrExpired => return Ok(Decision::InvalidOrExpired),
        };
        let response = self.endpoint.decide(&code, action, session_token).await?;
        Ok(match (response, action) {
            (DecisionResponse::Accepted, ApprovalAction::Approve) => Decision::Approved,
            (DecisionResponse::Accepted, ApprovalAction::Deny) => Decision::Denied,
            (DecisionResponse::Rejected, _) => Decision::InvalidOrExpired,
        })
    }
}
