//! HTTP server command — `finrouter serve`.

use std::sync::Arc;

use anyhow::Result;
use finrouter::finrouter_config::FinrouterConfig;
use finrouter::server::{AppState, ServerConfig, start_server};

pub async fn cmd_serve(config: FinrouterConfig, dev: bool) -> Result<()> {
    let _guard = finrouter::logging::init(config.verbose, Some(&config.log_dir()));

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let orchestrator = finrouter::runtime::build_orchestrator(&config)?;
    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        uploads: finrouter::runtime::build_uploads(&config),
    });

    start_server(
        ServerConfig {
            port: config.port(),
            dev_mode: dev,
        },
        state,
    )
    .await
}
