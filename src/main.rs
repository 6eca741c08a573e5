//! orbital CLI binary entry point.

use clap::Parser;
use orbital::cli::{self, Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Login(args) => cli::auth::handle_login(args).await,
        Commands::Logout => cli::auth::handle_logout().await,
        Commands::Status => cli::auth::handle_status().await,
        Commands::Whoami(args) => cli::auth::handle_whoami(args).await,
        Commands::Approve(args) => cli::auth::handle_approve(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if let Some(hint) = e.hint() {
            eprintln!("{hint}");
        }
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("orbital=debug")
    } else {
        EnvFilter::try_from_env("ORBITAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
