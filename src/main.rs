//! Folio CLI Entry Point
//!
//! Without a subcommand Folio prompts for credentials, opens a session and
//! runs the interactive menu until the user picks Exit. `configure` saves
//! connection defaults instead.
//!
//! The menu owns stdout. Notices, errors and logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use folio::console::{self, StderrNotices};
use folio::{load_with_precedence, update_config, ConfigLocation, Dispatcher, FolioConfig};

/// Folio - role-gated administrative shell for a PostgreSQL book catalog
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Role-gated administrative shell for a PostgreSQL book catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Do not print backend notices
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Backend hostname
    #[arg(long)]
    host: Option<String>,

    /// Backend port
    #[arg(long)]
    port: Option<u16>,

    /// Database to open (prompted when omitted)
    #[arg(long, short = 'd')]
    database: Option<String>,

    /// Username (prompted when omitted)
    #[arg(long, short = 'U')]
    user: Option<String>,

    /// Table to operate on (prompted when omitted)
    #[arg(long, short = 't')]
    table: Option<String>,
}

impl ConnectionArgs {
    fn overlay(&self) -> FolioConfig {
        FolioConfig {
            host: self.host.clone(),
            port: self.port,
            default_table: self.table.clone(),
            ..FolioConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Save connection defaults to the local (or global) config file
    Configure(ConfigureArgs),
}

#[derive(Args)]
struct ConfigureArgs {
    /// Write `~/.config/folio/config.json` instead of `.folio/config.json`
    #[arg(long)]
    global: bool,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Database used to create and drop databases
    #[arg(long)]
    maintenance_database: Option<String>,

    /// Username granted the Administrator role
    #[arg(long)]
    admin_username: Option<String>,

    /// Lowest backend notice level to receive (notice, warning, ...)
    #[arg(long)]
    client_min_messages: Option<String>,

    #[arg(long)]
    default_table: Option<String>,

    /// Environment variable to read the password from
    #[arg(long)]
    password_env: Option<String>,
}

impl ConfigureArgs {
    fn into_config(self) -> FolioConfig {
        FolioConfig {
            host: self.host,
            port: self.port,
            maintenance_database: self.maintenance_database,
            admin_username: self.admin_username,
            client_min_messages: self.client_min_messages,
            default_table: self.default_table,
            password_env: self.password_env,
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("folio=error"));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Commands::Configure(args)) = cli.command {
        let location = if args.global { ConfigLocation::Global } else { ConfigLocation::Local };
        let path = update_config(location, args.into_config())?;
        println!("Configuration saved to {}", path.display());
        return Ok(());
    }

    let config = load_with_precedence()?.merge(cli.connection.overlay());

    let credentials = console::prompt_credentials(
        cli.connection.database.as_deref(),
        cli.connection.user.as_deref(),
        &config,
    )?;

    let session = folio::bootstrap(&credentials, &config)
        .await
        .with_context(|| format!("could not open database '{}'", credentials.database))?;
    println!("Connection successful.");

    let table = console::prompt_table(config.default_table.as_deref())?;

    let mut dispatcher = Dispatcher::new(session.gateway, session.role, table);
    if !cli.quiet {
        dispatcher = dispatcher.with_observer(Arc::new(StderrNotices));
    }

    let outcome = console::run(&dispatcher).await;
    let closed = dispatcher.shutdown().await;
    outcome?;
    closed?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Critical error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
