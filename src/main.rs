use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finrouter_common::Identity;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "finrouter")]
#[command(version, about = "Route financial questions through planned agents and aggregate their answers")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to the config file. Defaults to .finrouter/finrouter.toml in the project directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to serve on (overrides finrouter.toml)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Run one request locally and print the response
    Ask {
        message: String,

        #[arg(long, default_value = "cli")]
        user: String,

        #[arg(long, default_value = "default")]
        session: String,

        /// Text document to answer from
        #[arg(long)]
        document: Option<PathBuf>,

        /// Image to answer from
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Show the plan the router would produce, as JSON
    Plan {
        message: String,

        #[arg(long, default_value = "cli")]
        user: String,

        #[arg(long, default_value = "default")]
        session: String,
    },
    /// View and manage configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default finrouter.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = cmd::load_config(&cli, &project_dir)?;

    match &cli.command {
        Commands::Serve { port, dev } => {
            let config = config.with_cli_args(cli.verbose, *port);
            cmd::cmd_serve(config, *dev).await?;
        }
        Commands::Ask {
            message,
            user,
            session,
            document,
            image,
        } => {
            cmd::cmd_ask(
                config,
                message.clone(),
                Identity::new(user, session),
                document.clone(),
                image.clone(),
            )
            .await?;
        }
        Commands::Plan { message, user, session } => {
            cmd::cmd_plan(config, message.clone(), Identity::new(user, session)).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
