//! orbital — OAuth 2.0 Device Authorization Grant (RFC 8628) client.
//!
//! Requests a device code, lets the operator approve it from a browser, polls
//! the token endpoint with the protocol's backoff rules, and keeps the
//! resulting token in a per-user file.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use orbital::auth::{AuthService, FileTokenStore, HttpAuthServer};
//! use orbital::config::{ConfigOverrides, OrbitalConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> orbital::error::Result<()> {
//! let config = OrbitalConfig::load(ConfigOverrides::default())?;
//! let store = Arc::new(FileTokenStore::new(config.token_store_config()));
//! let server = Arc::new(HttpAuthServer::new(&config.server_url)?);
//! let svc = AuthService::new(server, store, config.require_client_id()?);
//!
//! let authorization = svc.start_login(&config.scope).await?;
//! println!("Enter {} at {}", authorization.user_code, authorization.verification_uri);
//! svc.complete_login(&authorization, &CancellationToken::new(), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
