//! Run execution: state, dispatch, step running and aggregation.

pub mod aggregator;
pub mod dispatcher;
pub mod engine;
pub mod runner;
pub mod state;

pub use aggregator::{AggregationInput, Aggregator, NO_OUTPUTS_SENTINEL};
pub use dispatcher::{Dispatch, next_step};
pub use engine::{Orchestrator, OrchestratorSettings, RunReport, RunRequest};
pub use runner::{StepOutcome, StepRunner, build_dependency_context};
pub use state::{RunSeed, RunSnapshot, RunState};
