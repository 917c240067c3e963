//! `villadmin` command-line client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use villadmin_auth::{NavigationTree, Navigator, navigation};
use villadmin_client::{ApiClient, AuthApi, ClientConfig, LoginRequest};

#[derive(Debug, Parser)]
#[command(name = "villadmin", about = "Village administration API client")]
struct Cli {
    /// API base URL.
    #[arg(long, env = "VILLADMIN_API_BASE_URL")]
    base_url: Option<String>,

    /// Token file (defaults to the platform data directory).
    #[arg(long, env = "VILLADMIN_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current session.
    Status,
    /// Log in and store the issued tokens.
    Login { email: String, password: String },
    /// Exchange the stored refresh token for a new pair.
    Refresh,
    /// Forget the stored tokens.
    Logout,
    /// Print the navigation visible to the current session.
    Nav {
        /// JSON navigation tree; the built-in sidebar when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Authorized GET, printing the JSON response.
    Get { path: String },
}

/// Terminal stand-in for client-side navigation.
struct CliNavigator;

impl Navigator for CliNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!(route, "session ended; log in again");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    villadmin_observability::init_with_default("warn");

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = ApiClient::from_config(&config).with_navigator(Arc::new(CliNavigator));
    let session = client.session();

    match cli.command {
        Command::Status => {
            let level = session.role_level();
            print_json(&json!({
                "interactive": client.tokens().is_interactive(),
                "authenticated": session.is_authenticated(),
                "role_level": level.map(|l| l.get()),
                "role": level.map(|l| l.label()),
                "expires_in": session.time_until_expiration(),
            }))?;
        }
        Command::Login { email, password } => {
            AuthApi::new(&client)
                .login_and_store(&LoginRequest { email, password })
                .await
                .context("login failed")?;
            println!("logged in");
        }
        Command::Refresh => {
            AuthApi::new(&client)
                .refresh_and_store()
                .await
                .context("refresh failed")?;
            println!("token refreshed");
        }
        Command::Logout => {
            session.logout(client.navigator());
            println!("logged out");
        }
        Command::Nav { config } => {
            let tree = match config {
                Some(path) => NavigationTree::load(&path)
                    .with_context(|| format!("failed to load navigation from {}", path.display()))?,
                None => NavigationTree::sidebar(),
            };
            print_json(&json!({
                "links": navigation::site_links(client.base_url()),
                "sidebar": tree.visible_to(session.role_level()),
            }))?;
        }
        Command::Get { path } => {
            let body = client.get(&path).await.with_context(|| format!("GET {path} failed"))?;
            print_json(&body)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.base_url {
        Some(base_url) => ClientConfig::new(base_url.clone())?,
        None => ClientConfig::from_env()?,
    };

    Ok(match &cli.token_file {
        Some(path) => config.with_storage_path(Some(path.clone())),
        None => config,
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
