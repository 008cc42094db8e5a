use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskorder::config::TaskorderToml;
use taskorder::logging::{LogConfig, init_logging};

mod cmd;

#[derive(Parser)]
#[command(name = "taskorder")]
#[command(version, about = "Fractional drag-and-drop ordering for task lists")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: .taskorder/taskorder.toml)
    #[arg(long, global = true, env = "TASKORDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database path. Overrides [server] db_path.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the board HTTP/WebSocket server
    Serve {
        /// Port to serve on (default from config, then TASKORDER_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind 0.0.0.0 and allow any CORS origin
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and a default config file
    Init,
    /// Print a collection in display order
    List {
        collection: String,

        /// Read from the hosted table configured under [remote]
        #[arg(long)]
        remote: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Append an item to a collection
    Add {
        collection: String,
        title: String,

        /// Explicit sort key instead of appending
        #[arg(long, allow_hyphen_values = true)]
        key: Option<f64>,
    },
    /// Move an item to a zero-based index
    Move {
        collection: String,
        item: String,
        index: usize,

        #[arg(long)]
        remote: bool,
    },
    /// Rewrite a collection's keys with even spacing
    Renumber {
        collection: String,

        #[arg(long)]
        remote: bool,
    },
    /// Print the key for a slot between two neighbour keys
    Key {
        #[arg(long, allow_hyphen_values = true)]
        prev: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        next: Option<f64>,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Create a default taskorder.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Commands that create the config file must not require it.
    let creating = matches!(
        cli.command,
        Commands::Init
            | Commands::Config {
                command: Some(ConfigCommands::Init)
            }
    );
    let config = match cli.config.as_deref() {
        Some(path) if creating && !path.exists() => TaskorderToml::default(),
        explicit => TaskorderToml::resolve(explicit)?,
    };
    let _log_guard = init_logging(&LogConfig::from_section(&config.logging, cli.verbose))?;
    // `config show|validate` must still be able to report a broken file.
    if !matches!(cli.command, Commands::Config { .. }) {
        config.ensure_valid()?;
    }

    let db_path = cli
        .db_path
        .clone()
        .unwrap_or_else(|| config.server.db_path.clone());

    match &cli.command {
        Commands::Serve { port, dev } => cmd::cmd_serve(&config, db_path, *port, *dev).await?,
        Commands::Init => cmd::cmd_init(cli.config.as_deref(), &db_path)?,
        Commands::List {
            collection,
            remote,
            json,
        } => cmd::cmd_list(&config, &db_path, collection, *remote, *json).await?,
        Commands::Add {
            collection,
            title,
            key,
        } => cmd::cmd_add(&config, &db_path, collection, title, *key).await?,
        Commands::Move {
            collection,
            item,
            index,
            remote,
        } => cmd::cmd_move(&config, &db_path, collection, item, *index, *remote).await?,
        Commands::Renumber { collection, remote } => {
            cmd::cmd_renumber(&config, &db_path, collection, *remote).await?
        }
        Commands::Key { prev, next } => cmd::cmd_key(*prev, *next)?,
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command.clone())?
        }
    }

    Ok(())
}
