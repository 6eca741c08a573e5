//! CLI entry point for orbital.

pub mod auth;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

/// Orbital device-authorization CLI
#[derive(Parser, Debug)]
#[command(name = "orbital", version, about = "Sign this machine in with the OAuth device flow")]
pub struct Cli {
    /// Log protocol details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in through the device authorization flow
    Login(LoginArgs),
    /// Remove the stored token
    Logout,
    /// Show whether a usable token is stored
    Status,
    /// Show the account behind the stored token
    Whoami(ServerArgs),
    /// Approve (or deny) another device's pending sign-in
    Approve(ApproveArgs),
}

/// Authorization server selection shared by several commands.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Authentication server URL
    #[arg(long)]
    pub server_url: Option<String>,
}

/// Arguments for `orbital login`.
#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// OAuth client ID
    #[arg(long)]
    pub client_id: Option<String>,

    /// Space-separated scopes to request
    #[arg(long)]
    pub scope: Option<String>,

    /// Sign in again even if a valid token is stored
    #[arg(long)]
    pub force: bool,

    /// Do not open the verification page in a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Arguments for `orbital approve`.
#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Code shown on the other device (XXXX-XXXX)
    pub code: String,

    /// Deny the request instead of approving it
    #[arg(long)]
    pub deny: bool,

    #[command(flatten)]
    pub server: ServerArgs,
}

impl LoginArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server_url: self.server.server_url.clone(),
            client_id: self.client_id.clone(),
            scope: self.scope.clone(),
            config_dir: None,
        }
    }
}

impl ServerArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server_url: self.server_url.clone(),
            ..Default::default()
        }
    }
}
