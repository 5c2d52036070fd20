//! CLI command implementations.
//!
//! | Module   | Commands handled  |
//! |----------|-------------------|
//! | `serve`  | `Serve`           |
//! | `ask`    | `Ask`, `Plan`     |
//! | `config` | `Config`          |

pub mod ask;
pub mod config;
pub mod serve;

pub use ask::{cmd_ask, cmd_plan};
pub use config::cmd_config;
pub use serve::cmd_serve;

use anyhow::Result;
use finrouter::finrouter_config::{FinrouterConfig, Secrets};

use crate::Cli;

/// Resolve configuration for the project: file, then `.env` and process
/// environment, then global CLI flags.
pub fn load_config(cli: &Cli, project_dir: &std::path::Path) -> Result<FinrouterConfig> {
    match dotenvy::from_path(project_dir.join(".env")) {
        Ok(()) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("Warning: failed to load .env: {}", e),
    }
    let config = FinrouterConfig::new(project_dir.to_path_buf(), cli.config.clone(), Secrets::from_env())?;
    Ok(config.with_cli_args(cli.verbose, None))
}
