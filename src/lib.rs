pub mod capabilities;
pub mod checkpoint;
pub mod errors;
pub mod finrouter_config;
pub mod history;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod orchestrator;
pub mod router;
pub mod runtime;
pub mod server;
pub mod uploads;
pub mod util;
