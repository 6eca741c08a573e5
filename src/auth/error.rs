use thiserror::Error;

/// Failures talking to the authorization server.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Server rejected request (status {status}): {}", rejection_message(.error, .description))]
    ServerRejected {
        status: u16,
        error: Option<String>,
        description: Option<String>,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid server URL {0}")]
    InvalidUrl(String),
}

impl AuthError {
    /// Whether the failure happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

fn rejection_message(error: &Option<String>, description: &Option<String>) -> String {
    match (error, description) {
        (_, Some(description)) => description.clone(),
        (Some(error), None) => error.clone(),
        (None, None) => "no error details".to_string(),
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::InvalidResponse(error.to_string());
        }
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Local credential storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Token path {0} has no file name")]
    InvalidPath(String),
}
