//! Configuration for finrouter.
//!
//! Settings are read from `.finrouter/finrouter.toml` and layered:
//! file → environment (`.env` is loaded first) → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8080
//! uploads_dir = "uploads"
//!
//! [llm]
//! provider = "gemini"          # or "claude-cli"
//! model = "gemini-2.0-flash"
//! temperature = 0.0
//!
//! [memory]
//! provider = "mem0"            # or "local"
//!
//! [search]
//! max_results = 3
//! topic = "finance"
//! time_range = "month"
//! include_domains = ["reuters.com"]
//! exclude_domains = ["reddit.com"]
//!
//! [orchestrator]
//! history_window = 10
//! step_timeout_secs = 120
//! run_timeout_secs = 600
//! checkpoints = true
//! ```
//!
//! API keys are never read from the file: `GOOGLE_API_KEY`, `TAVILY_API_KEY`
//! and `MEM0_API_KEY` come from the environment, as does `CLAUDE_CMD`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capabilities::SearchOptions;
use crate::history::HISTORY_WINDOW;
use crate::orchestrator::OrchestratorSettings;

pub const CONFIG_DIR: &str = ".finrouter";
pub const CONFIG_FILE: &str = "finrouter.toml";

/// Which language model backs planning, steps and synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProvider {
    #[default]
    Gemini,
    ClaudeCli,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Gemini => write!(f, "gemini"),
            LlmProvider::ClaudeCli => write!(f, "claude-cli"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "claude-cli" | "claude" => Ok(LlmProvider::ClaudeCli),
            _ => anyhow::bail!("Invalid LLM provider '{}'. Valid values: gemini, claude-cli", s),
        }
    }
}

/// Where long-term memory is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryProvider {
    #[default]
    Mem0,
    Local,
}

impl std::fmt::Display for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryProvider::Mem0 => write!(f, "mem0"),
            MemoryProvider::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Relative paths resolve against the project directory.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

fn default_port() -> u16 {
    8080
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySection {
    #[serde(default)]
    pub provider: MemoryProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_include_domains")]
    pub include_domains: Vec<String>,
    #[serde(default = "default_exclude_domains")]
    pub exclude_domains: Vec<String>,
}

fn default_max_results() -> u32 {
    3
}

fn default_topic() -> String {
    "finance".to_string()
}

fn default_time_range() -> String {
    "month".to_string()
}

fn default_include_domains() -> Vec<String> {
    [
        "financialexpress.com",
        "economictimes.indiatimes.com",
        "livemint.com",
        "thehindu.com",
        "moneycontrol.com",
        "business-standard.com",
        "reuters.com",
        "bloomberg.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclude_domains() -> Vec<String> {
    [
        "reddit.com",
        "twitter.com",
        "x.com",
        "facebook.com",
        "instagram.com",
        "youtube.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            topic: default_topic(),
            time_range: default_time_range(),
            include_domains: default_include_domains(),
            exclude_domains: default_exclude_domains(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSection {
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_checkpoints")]
    pub checkpoints: bool,
}

fn default_history_window() -> usize {
    HISTORY_WINDOW
}

fn default_step_timeout_secs() -> u64 {
    120
}

fn default_run_timeout_secs() -> u64 {
    600
}

fn default_checkpoints() -> bool {
    true
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            step_timeout_secs: default_step_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
            checkpoints: default_checkpoints(),
        }
    }
}

/// The complete finrouter.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinrouterToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
}

impl FinrouterToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse finrouter.toml")
    }

    /// Load from `<dir>/finrouter.toml`, or defaults if the file doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize finrouter.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_results: self.search.max_results,
            topic: self.search.topic.clone(),
            time_range: self.search.time_range.clone(),
            include_domains: self.search.include_domains.clone(),
            exclude_domains: self.search.exclude_domains.clone(),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            history_window: self.orchestrator.history_window,
            step_timeout: Duration::from_secs(self.orchestrator.step_timeout_secs),
            run_timeout: Duration::from_secs(self.orchestrator.run_timeout_secs),
        }
    }

    /// Validate the file contents and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.orchestrator.history_window == 0 {
            warnings.push("orchestrator.history_window is 0: routing will see no conversation history".to_string());
        }
        if self.orchestrator.step_timeout_secs == 0 {
            warnings.push("orchestrator.step_timeout_secs is 0: every step will time out".to_string());
        }
        if self.orchestrator.run_timeout_secs == 0 {
            warnings.push("orchestrator.run_timeout_secs is 0: every run will exceed its deadline".to_string());
        }
        if self.orchestrator.step_timeout_secs > self.orchestrator.run_timeout_secs {
            warnings.push(format!(
                "orchestrator.step_timeout_secs ({}) exceeds run_timeout_secs ({})",
                self.orchestrator.step_timeout_secs, self.orchestrator.run_timeout_secs
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            warnings.push(format!(
                "llm.temperature {} is outside the usual 0.0-2.0 range",
                self.llm.temperature
            ));
        }
        if self.search.max_results == 0 {
            warnings.push("search.max_results is 0: news steps will never find articles".to_string());
        }
        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }

        warnings
    }
}

/// Secrets and commands taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub google_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub mem0_api_key: Option<String>,
    pub claude_cmd: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            google_api_key: get("GOOGLE_API_KEY"),
            tavily_api_key: get("TAVILY_API_KEY"),
            mem0_api_key: get("MEM0_API_KEY"),
            claude_cmd: get("CLAUDE_CMD"),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct FinrouterConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub toml: FinrouterToml,
    pub secrets: Secrets,
    pub verbose: bool,
    /// CLI override for the server port.
    pub cli_port: Option<u16>,
}

impl FinrouterConfig {
    /// Resolve configuration for a project directory. `config_file` overrides
    /// the default `.finrouter/finrouter.toml` location.
    pub fn new(project_dir: PathBuf, config_file: Option<PathBuf>, secrets: Secrets) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let config_file = config_file.unwrap_or_else(|| config_dir.join(CONFIG_FILE));
        let toml = if config_file.exists() {
            FinrouterToml::load(&config_file)?
        } else {
            FinrouterToml::default()
        };

        Ok(Self {
            project_dir,
            config_dir,
            config_file,
            toml,
            secrets,
            verbose: false,
            cli_port: None,
        })
    }

    pub fn with_cli_args(mut self, verbose: bool, port: Option<u16>) -> Self {
        self.verbose = verbose;
        self.cli_port = port;
        self
    }

    /// Port (CLI → file → default).
    pub fn port(&self) -> u16 {
        self.cli_port.unwrap_or(self.toml.server.port)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        let dir = Path::new(&self.toml.server.uploads_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.project_dir.join(dir)
        }
    }

    pub fn checkpoint_db(&self) -> PathBuf {
        self.config_dir.join("checkpoints.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.config_dir.join("logs")
    }

    pub fn claude_cmd(&self) -> String {
        self.secrets
            .claude_cmd
            .clone()
            .unwrap_or_else(|| "claude".to_string())
    }

    /// File warnings plus missing secrets for the selected providers.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if self.toml.llm.provider == LlmProvider::Gemini && self.secrets.google_api_key.is_none() {
            warnings.push("GOOGLE_API_KEY is not set (required for llm.provider = \"gemini\")".to_string());
        }
        if self.secrets.tavily_api_key.is_none() {
            warnings.push("TAVILY_API_KEY is not set: news steps will fail".to_string());
        }
        if self.toml.memory.provider == MemoryProvider::Mem0 && self.secrets.mem0_api_key.is_none() {
            warnings.push("MEM0_API_KEY is not set (required for memory.provider = \"mem0\")".to_string());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn all_secrets() -> Secrets {
        Secrets::from_lookup(|key| Some(format!("{}-value", key)))
    }

    #[test]
    fn test_llm_provider_from_str() {
        assert_eq!("gemini".parse::<LlmProvider>().unwrap(), LlmProvider::Gemini);
        assert_eq!("Claude-CLI".parse::<LlmProvider>().unwrap(), LlmProvider::ClaudeCli);
        let err = "openai".parse::<LlmProvider>().unwrap_err();
        assert!(err.to_string().contains("Invalid LLM provider"));
    }

    #[test]
    fn test_defaults() {
        let toml = FinrouterToml::default();
        assert_eq!(toml.server.port, 8080);
        assert_eq!(toml.llm.provider, LlmProvider::Gemini);
        assert_eq!(toml.llm.model, "gemini-2.0-flash");
        assert_eq!(toml.memory.provider, MemoryProvider::Mem0);
        assert_eq!(toml.search.max_results, 3);
        assert_eq!(toml.orchestrator.history_window, 10);
        assert!(toml.orchestrator.checkpoints);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let toml = FinrouterToml::parse(
            r#"
            [llm]
            provider = "claude-cli"

            [orchestrator]
            step_timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(toml.llm.provider, LlmProvider::ClaudeCli);
        assert_eq!(toml.llm.model, "gemini-2.0-flash");
        assert_eq!(toml.orchestrator.step_timeout_secs, 30);
        assert_eq!(toml.orchestrator.run_timeout_secs, 600);
        assert_eq!(toml.search.topic, "finance");
    }

    #[test]
    fn test_parse_rejects_unknown_provider() {
        assert!(FinrouterToml::parse("[memory]\nprovider = \"redis\"\n").is_err());
    }

    #[test]
    fn test_validate_flags_zero_timeouts() {
        let mut toml = FinrouterToml::default();
        toml.orchestrator.step_timeout_secs = 0;
        toml.orchestrator.history_window = 0;
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("step_timeout_secs is 0")));
        assert!(warnings.iter().any(|w| w.contains("history_window is 0")));
    }

    #[test]
    fn test_validate_flags_step_longer_than_run() {
        let mut toml = FinrouterToml::default();
        toml.orchestrator.step_timeout_secs = 900;
        assert!(toml.validate().iter().any(|w| w.contains("exceeds run_timeout_secs")));
    }

    #[test]
    fn test_settings_conversion() {
        let toml = FinrouterToml::default();
        let settings = toml.orchestrator_settings();
        assert_eq!(settings.step_timeout, Duration::from_secs(120));
        assert_eq!(settings.history_window, 10);
        assert_eq!(toml.search_options().max_results, 3);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut toml = FinrouterToml::default();
        toml.server.port = 9090;
        toml.save(&path).unwrap();
        let loaded = FinrouterToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.server.port, 9090);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = FinrouterToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.server.port, 8080);
    }

    #[test]
    fn test_secrets_treat_empty_as_unset() {
        let secrets = Secrets::from_lookup(|key| match key {
            "GOOGLE_API_KEY" => Some("  ".to_string()),
            "TAVILY_API_KEY" => Some("tvly".to_string()),
            _ => None,
        });
        assert!(secrets.google_api_key.is_none());
        assert_eq!(secrets.tavily_api_key.as_deref(), Some("tvly"));
    }

    #[test]
    fn test_config_layers_cli_port_and_paths() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_DIR).join(CONFIG_FILE),
            "[server]\nport = 7000\nuploads_dir = \"files\"\n",
        )
        .unwrap();

        let config = FinrouterConfig::new(dir.path().to_path_buf(), None, all_secrets()).unwrap();
        assert_eq!(config.port(), 7000);
        assert!(config.uploads_dir().ends_with("files"));
        assert!(config.checkpoint_db().ends_with(".finrouter/checkpoints.db"));

        let config = config.with_cli_args(true, Some(7100));
        assert_eq!(config.port(), 7100);
        assert!(config.verbose);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_config_explicit_file() {
        let dir = tempdir().unwrap();
        let custom = dir.path().join("custom.toml");
        std::fs::write(&custom, "[server]\nport = 6000\n").unwrap();
        let config = FinrouterConfig::new(dir.path().to_path_buf(), Some(custom), all_secrets()).unwrap();
        assert_eq!(config.port(), 6000);
    }

    #[test]
    fn test_validate_reports_missing_secrets() {
        let dir = tempdir().unwrap();
        let config = FinrouterConfig::new(dir.path().to_path_buf(), None, Secrets::default()).unwrap();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("GOOGLE_API_KEY")));
        assert!(warnings.iter().any(|w| w.contains("TAVILY_API_KEY")));
        assert!(warnings.iter().any(|w| w.contains("MEM0_API_KEY")));
    }
}
