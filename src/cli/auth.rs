//! CLI auth command handlers for login, logout, status, whoami and approve.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::{ApproveArgs, LoginArgs, ServerArgs};
use crate::auth::{
    require_active, AuthService, Decision, DeviceAuthorization, DeviceVerifier, FileTokenStore,
    HttpAuthServer, LoginStatus, PollEvent, PollEventSink, PollState, TokenStore,
};
use crate::config::{ConfigOverrides, OrbitalConfig};
use crate::error::{OrbitalError, Result};

/// Handle `orbital login`.
pub async fn handle_login(args: LoginArgs) -> Result<()> {
    let config = OrbitalConfig::load(args.overrides())?;
    let store = Arc::new(FileTokenStore::new(config.token_store_config()));

    if !args.force {
        if let LoginStatus::Active(record) = LoginStatus::evaluate(store.read(), Utc::now()) {
            match record.expires_at {
                Some(expires) => println!(
                    "Already logged in (token valid until {}).",
                    expires.format("%Y-%m-%d %H:%M UTC")
                ),
                None => println!("Already logged in."),
            }
            println!("Run `orbital login --force` to sign in again.");
            return Ok(());
        }
    }

    let client_id = config.require_client_id()?.to_string();
    let server = Arc::new(HttpAuthServer::new(&config.server_url)?);
    let svc = AuthService::new(server, store, client_id);

    println!("Requesting device authorization from {}", config.server_url);
    let authorization = svc.start_login(&config.scope).await?;
    print_instructions(&authorization);
    if !args.no_browser {
        open_browser(authorization.browser_uri());
    }
    println!(
        "Waiting for authorization... (expires in {} minutes, Ctrl-C to cancel)",
        authorization.expires_in / 60
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let result = svc
        .complete_login(&authorization, &cancel, Some(progress_sink()))
        .await;
    interrupt.abort();

    let record = result?;
    println!("✅ Successfully logged in! (token {})", record.preview());
    if let Some(expires) = record.expires_at {
        println!("   Valid until {}", expires.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

/// Handle `orbital logout`.
pub async fn handle_logout() -> Result<()> {
    let config = OrbitalConfig::load(ConfigOverrides::default())?;
    let store = FileTokenStore::new(config.token_store_config());
    store.clear()?;
    println!("Logged out.");
    Ok(())
}

/// Handle `orbital status`.
pub async fn handle_status() -> Result<()> {
    let config = OrbitalConfig::load(ConfigOverrides::default())?;
    let store = FileTokenStore::new(config.token_store_config());

    match LoginStatus::evaluate(store.read(), Utc::now()) {
        LoginStatus::Active(record) => {
            println!("Logged in to {}", config.server_url);
            println!("  Token:   {} ({})", record.preview(), record.token_type);
            if !record.scope.is_empty() {
                println!("  Scope:   {}", record.scope);
            }
            if let Some(expires) = record.expires_at {
                println!("  Expires: {}", expires.format("%Y-%m-%d %H:%M UTC"));
            }
            Ok(())
        }
        LoginStatus::Expired(record) => {
            if let Some(expires) = record.expires_at {
                println!("Token expired or expiring at {}", expires.format("%Y-%m-%d %H:%M UTC"));
            }
            Err(OrbitalError::SessionExpired)
        }
        LoginStatus::LoggedOut => Err(OrbitalError::NotLoggedIn),
    }
}

/// Handle `orbital whoami`.
pub async fn handle_whoami(args: ServerArgs) -> Result<()> {
    let config = OrbitalConfig::load(args.overrides())?;
    let store = FileTokenStore::new(config.token_store_config());
    let record = require_active(&store)?;

    let server = HttpAuthServer::new(&config.server_url)?;
    let user = server
        .fetch_session(&record.access_token)
        .await?
        .ok_or(OrbitalError::SessionExpired)?;
    match (user.name, user.email) {
        (Some(name), Some(email)) => println!("{name} <{email}>"),
        (Some(name), None) => println!("{name}"),
        (None, Some(email)) => println!("{email}"),
        (None, None) => println!("Signed in (the server returned no profile details)"),
    }
    Ok(())
}

/// Handle `orbital approve <code>`.
pub async fn handle_approve(args: ApproveArgs) -> Result<()> {
    let config = OrbitalConfig::load(args.server.overrides())?;
    let store = FileTokenStore::new(config.token_store_config());
    let session = require_active(&store)?;

    let verifier = DeviceVerifier::new(Arc::new(HttpAuthServer::new(&config.server_url)?));
    let decision = if args.deny {
        verifier.deny(&args.code, &session.access_token).await?
    } else {
        verifier.approve(&args.code, &session.access_token).await?
    };

    match decision {
        Decision::Approved => println!("✅ Device approved."),
        Decision::Denied => println!("Device request denied."),
        Decision::InvalidOrExpired => return Err(OrbitalError::InvalidOrExpiredCode),
    }
    Ok(())
}

fn print_instructions(authorization: &DeviceAuthorization) {
    println!("Device authorization required.");
    println!("1. Visit: {}", authorization.verification_uri);
    println!("2. Enter the code: {}", authorization.user_code);
}

fn open_browser(url: &str) {
    match opener::open(url) {
        Ok(()) => println!("Opened {url} in your browser."),
        Err(e) => {
            tracing::debug!(error = %e, "browser launch failed");
            eprintln!("⚠️  Could not open a browser automatically; open the URL above manually.");
        }
    }
}

fn progress_sink() -> PollEventSink {
    Arc::new(|event: PollEvent| match event {
        PollEvent::SlowedDown { interval } => {
            eprintln!("Server asked to slow down; polling every {}s", interval.as_secs());
        }
        PollEvent::Finished {
            state: PollState::Approved,
            ..
        } => eprintln!("Authorization received."),
        PollEvent::Finished { state, .. } => tracing::debug!(%state, "polling finished"),
        _ => {}
    })
}
