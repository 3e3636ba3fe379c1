//! campus - command line client for a campus LMS server.
//!
//! A thin wrapper over the `campus-client` library for trying out a
//! deployment from a terminal: auth, profile checks and realtime chat.

mod cli;
mod commands;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use campus_client::{CredentialStore, FileStorage, Session};
use campus_core::ApiUrl;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let base = resolve_api_url(cli.api_url.clone())?;
    let store = Arc::new(
        CredentialStore::open(FileStorage::new(token_path()?))
            .context("Failed to open credential store")?,
    );
    let session = Session::new(base, store);

    match cli.command {
        Commands::Login { email, password } => commands::auth::login(&session, email, password).await,
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
            role,
        } => {
            commands::auth::register(&session, email, password, first_name, last_name, role.into())
                .await
        }
        Commands::Logout => commands::auth::logout(&session).await,
        Commands::Whoami => commands::auth::whoami(&session).await,
        Commands::Chat { dialog_id } => commands::chat::run(&session, dialog_id).await,
    }
}

fn resolve_api_url(flag: Option<String>) -> Result<ApiUrl> {
    let raw = match flag {
        Some(url) => url,
        None => std::env::var("CAMPUS_API_URL")
            .context("No API URL: pass --api-url or set CAMPUS_API_URL")?,
    };
    ApiUrl::new(&raw).with_context(|| format!("Invalid API URL '{}'", raw))
}

/// Path of the persisted token file in the platform data directory.
fn token_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "campus").context("Could not determine config directory")?;

    let data_dir = dirs.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("tokens.json"))
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
