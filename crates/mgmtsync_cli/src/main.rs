//! mgmtsync CLI
//!
//! Idempotent reconciliation of configuration payloads against a management
//! REST API.
//!
//! # Commands
//!
//! - `apply` - Create or update resources from payload files
//! - `delete` - Delete one resource by identity or alias
//! - `exists` - Check whether a resource exists
//! - `list` - List identities or names of a kind
//! - `enable-all` / `disable-all` / `delete-all` - Bulk operations
//! - `wait` - Wait for a group's task server to go idle
//! - `ca-create` - Add a certificate authority from a PEM file

mod commands;
mod error;
mod ledger;

use clap::{Args, Parser, Subcommand};
use commands::manage::BulkOperation;
use mgmtsync_engine::ResourceKind;
use mgmtsync_transport::{ManageClient, ManageConfig, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Reconciles configuration payloads against a management REST API.
#[derive(Parser)]
#[command(name = "mgmtsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// URL scheme
    #[arg(global = true, long, env = "MGMTSYNC_SCHEME", default_value = "http")]
    scheme: String,

    /// Management host
    #[arg(global = true, long, env = "MGMTSYNC_HOST", default_value = "localhost")]
    host: String,

    /// Management port
    #[arg(global = true, long, env = "MGMTSYNC_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Operating user
    #[arg(global = true, short, long, env = "MGMTSYNC_USERNAME", default_value = "admin")]
    username: String,

    /// Operating user's password
    #[arg(global = true, long, env = "MGMTSYNC_PASSWORD", default_value = "admin", hide_env_values = true)]
    password: String,

    /// User with the manage-admin and security roles
    #[arg(global = true, long, env = "MGMTSYNC_SECURITY_USERNAME")]
    security_username: Option<String>,

    /// Security user's password
    #[arg(global = true, long, env = "MGMTSYNC_SECURITY_PASSWORD", hide_env_values = true)]
    security_password: Option<String>,

    /// Strip comments from JSON payloads before sending
    #[arg(global = true, long, env = "MGMTSYNC_CLEAN_JSON")]
    clean_json: bool,

    /// Use HTTPS and accept any server certificate
    #[arg(global = true, long, env = "MGMTSYNC_SIMPLE_SSL")]
    simple_ssl: bool,

    /// Request timeout in seconds
    #[arg(global = true, long, env = "MGMTSYNC_TIMEOUT", default_value_t = 30)]
    timeout_secs: u64,
}

impl ConnectionArgs {
    fn config(&self) -> ManageConfig {
        let mut config = ManageConfig::new(&self.host)
            .with_scheme(&self.scheme)
            .with_port(self.port)
            .with_credentials(&self.username, &self.password)
            .with_clean_json_payloads(self.clean_json)
            .with_simple_ssl(self.simple_ssl)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(user) = &self.security_username {
            config = config.with_security_credentials(
                user,
                self.security_password.as_deref().unwrap_or_default(),
            );
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update resources from payload files
    Apply {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,

        /// Skip files whose contents match this ledger, and record saved ones
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Payload files, applied in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete one resource by identity or alias
    Delete {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,

        /// Identity, name or alias value
        key: String,
    },

    /// Check whether a resource exists
    Exists {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,

        /// Identity, name or alias value
        key: String,
    },

    /// List identities of a kind
    List {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,

        /// List names instead of identities
        #[arg(short, long)]
        names: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Enable every resource of a kind
    EnableAll {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Disable every resource of a kind
    DisableAll {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Delete every resource of a kind
    DeleteAll {
        /// Resource kind
        #[arg(short, long)]
        kind: ResourceKind,

        /// Group for group-scoped kinds
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Wait for a group's task server to finish running requests
    Wait {
        /// Group name
        #[arg(short, long, default_value = mgmtsync_engine::DEFAULT_GROUP)]
        group: String,

        /// Milliseconds between checks
        #[arg(short, long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Add a certificate authority from a PEM file
    CaCreate {
        /// PEM file
        file: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("mgmtsync CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let client = ManageClient::connect(cli.connection.config())?;

    match cli.command {
        Commands::Apply {
            kind,
            group,
            ledger,
            format,
            files,
        } => {
            commands::apply::run(
                &client,
                kind,
                group.as_deref(),
                &files,
                ledger.as_deref(),
                &format,
            )?;
        }
        Commands::Delete { kind, group, key } => {
            commands::manage::delete(&client, kind, group.as_deref(), &key)?;
        }
        Commands::Exists { kind, group, key } => {
            commands::manage::exists(&client, kind, group.as_deref(), &key)?;
        }
        Commands::List {
            kind,
            group,
            names,
            format,
        } => {
            commands::manage::list(&client, kind, group.as_deref(), names, &format)?;
        }
        Commands::EnableAll { kind, group } => {
            commands::manage::bulk(&client, kind, group.as_deref(), BulkOperation::EnableAll)?;
        }
        Commands::DisableAll { kind, group } => {
            commands::manage::bulk(&client, kind, group.as_deref(), BulkOperation::DisableAll)?;
        }
        Commands::DeleteAll { kind, group } => {
            commands::manage::bulk(&client, kind, group.as_deref(), BulkOperation::DeleteAll)?;
        }
        Commands::Wait { group, interval_ms } => {
            commands::wait::run(&client, &group, Duration::from_millis(interval_ms))?;
        }
        Commands::CaCreate { file } => {
            commands::certificate::create(&client, &file)?;
        }
        Commands::Version => {}
    }

    Ok(())
}
