//! HTTP client for the authorization server's device-authorization routes.

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::approval::{ApprovalAction, ApprovalEndpoint, CodeLookup, DecisionResponse, UserCode};
use super::device_code::{
    DeviceAuthorization, DeviceFlowEndpoint, OAuthErrorBody, TokenPollResponse,
    DEVICE_CODE_GRANT_TYPE,
};
use super::error::AuthError;
use super::poller::REQUEST_TIMEOUT;
use super::token::TokenGrant;

const API_PREFIX: &str = "api/auth/";
const USER_AGENT: &str = concat!("orbital-cli/", env!("CARGO_PKG_VERSION"));

/// Authorization server reached over HTTP.
///
/// # Example
/// ```no_run
/// use orbital::auth::{DeviceFlowEndpoint, HttpAuthServer};
///
/// # async fn example() -> Result<(), orbital::auth::AuthError> {
/// let server = HttpAuthServer::new("http://localhost:3005")?;
/// let authorization = server
///     .request_device_code("my-client", "openid profile email")
///     .await?;
/// println!("Enter {} at {}", authorization.user_code, authorization.verification_uri);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpAuthServer {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthServer {
    pub fn new(server_url: &str) -> Result<Self, AuthError> {
        let mut base_url = parse_server_url(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let base_url = base_url
            .join(API_PREFIX)
            .map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, base_url })
    }

    fn url(&self, route: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(route)
            .map_err(|e| AuthError::InvalidUrl(e.to_string()))
    }

    /// Look up the user behind `access_token`. `None` when the server does not
    /// recognize the token.
    pub async fn fetch_session(&self, access_token: &str) -> Result<Option<SessionUser>, AuthError> {
        let resp = self
            .client
            .get(self.url("get-session")?)
            .header("Accept", "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        let payload: Option<SessionPayload> = resp.json().await?;
        Ok(payload.map(|p| p.user))
    }
}

#[async_trait]
impl DeviceFlowEndpoint for HttpAuthServer {
    async fn request_device_code(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<DeviceAuthorization, AuthError> {
        let resp = self
            .client
            .post(self.url("device/code")?)
            .header("Accept", "application/json")
            .json(&DeviceCodeRequest { client_id, scope })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        let authorization: DeviceAuthorization = resp.json().await?;
        tracing::debug!(
            user_code = %authorization.user_code,
            expires_in = authorization.expires_in,
            interval = authorization.interval,
            "device authorization issued"
        );
        Ok(authorization)
    }

    async fn poll_token(
        &self,
        client_id: &str,
        device_code: &str,
    ) -> Result<TokenPollResponse, AuthError> {
        let resp = self
            .client
            .post(self.url("device/token")?)
            .header("Accept", "application/json")
            .json(&DeviceTokenRequest {
                grant_type: DEVICE_CODE_GRANT_TYPE,
                device_code,
                client_id,
            })
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body).map_err(|_| {
            AuthError::InvalidResponse(format!(
                "Token endpoint returned non-JSON body with status {status}"
            ))
        })?;

        if status.is_success() && value.get("access_token").is_some() {
            let grant: TokenGrant = serde_json::from_value(value)?;
            return Ok(TokenPollResponse::Granted(grant));
        }
        if value.get("error").is_some() {
            let error: OAuthErrorBody = serde_json::from_value(value)?;
            return Ok(TokenPollResponse::from_error(error));
        }
        Err(AuthError::InvalidResponse(format!(
            "Token response with status {status} is missing token and error"
        )))
    }
}

#[async_trait]
impl ApprovalEndpoint for HttpAuthServer {
    async fn lookup_user_code(&self, code: &UserCode) -> Result<CodeLookup, AuthError> {
        let resp = self
            .client
            .get(self.url("device")?)
            .header("Accept", "application/json")
            .query(&[("user_code", code.as_str())])
            .send()
            .await?;
        match resp.status() {
            status if status.is_success() => {
                let payload: UserCodeStatus = resp.json().await?;
                Ok(CodeLookup::Found {
                    status: payload.status,
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => Ok(CodeLookup::NotFound),
            _ => Err(rejection(resp).await),
        }
    }

    async fn decide(
        &self,
        code: &UserCode,
        action: ApprovalAction,
        session_token: &str,
    ) -> Result<DecisionResponse, AuthError> {
        let path = match action {
            ApprovalAction::Approve => "device/approve",
            ApprovalAction::Deny => "device/deny",
        };
        let resp = self
            .client
            .post(self.url(path)?)
            .header("Accept", "application/json")
            .bearer_auth(session_token)
            .json(&DecisionRequest {
                user_code: code.as_str(),
            })
            .send()
            .await?;
        match resp.status() {
            status if status.is_success() => Ok(DecisionResponse::Accepted),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => Ok(DecisionResponse::Rejected),
            _ => Err(rejection(resp).await),
        }
    }
}

/// Identity returned by the session endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    user: SessionUser,
}

#[derive(Debug, Serialize)]
struct DeviceCodeRequest<'a> {
    client_id: &'a str,
    scope: &'a str,
}

#[derive(Debug, Serialize)]
struct DeviceTokenRequest<'a> {
    grant_type: &'a str,
    device_code: &'a str,
    client_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionRequest<'a> {
    user_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserCodeStatus {
    status: String,
}

/// Parse an authorization server URL: `http` or `https` with a host.
pub fn parse_server_url(raw: &str) -> Result<Url, AuthError> {
    let url = Url::parse(raw.trim()).map_err(|e| AuthError::InvalidUrl(format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AuthError::InvalidUrl(format!(
            "'{raw}': scheme must be http or https"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(AuthError::InvalidUrl(format!("'{raw}': missing host")));
    }
    Ok(url)
}

async fn rejection(resp: Response) -> AuthError {
    let status = resp.status().as_u16();
    let body = resp.json::<OAuthErrorBody>().await.ok();
    AuthError::ServerRejected {
        status,
        error: body.as_ref().map(|b| b.error.clone()),
        description: body.and_then(|b| b.error_description),
    }
}
