//! Configuration view and validation commands — `finrouter config`.

use anyhow::{Context, Result};
use finrouter::finrouter_config::{FinrouterConfig, FinrouterToml};

use super::super::ConfigCommands;

fn presence(value: &Option<String>) -> &'static str {
    if value.is_some() { "set" } else { "not set" }
}

pub fn cmd_config(config: &FinrouterConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.config_file;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("finrouter Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No finrouter.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let rendered = toml::to_string_pretty(&config.toml).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();

            println!("Environment:");
            println!("  GOOGLE_API_KEY = {}", presence(&config.secrets.google_api_key));
            println!("  TAVILY_API_KEY = {}", presence(&config.secrets.tavily_api_key));
            println!("  MEM0_API_KEY = {}", presence(&config.secrets.mem0_api_key));
            println!("  claude_cmd = \"{}\"", config.claude_cmd());
            println!();

            println!("Paths:");
            println!("  uploads = {}", config.uploads_dir().display());
            println!("  checkpoints = {}", config.checkpoint_db().display());
            println!("  logs = {}", config.log_dir().display());
            println!();

            if !config_path.exists() {
                println!("Run 'finrouter config init' to create a finrouter.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("finrouter.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            FinrouterToml::default().save(config_path)?;

            println!("Created finrouter.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [llm] provider, model, temperature");
            println!("  - [memory] provider");
            println!("  - [search] domains and time range");
            println!("  - [orchestrator] history window and timeouts");
            println!();
        }
    }

    Ok(())
}
