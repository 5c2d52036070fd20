use super::aggregator::{AggregationInput, Aggregator};
use super::dispatcher::{Dispatch, next_step};
use super::runner::{StepOutcome, StepRunner};
use super::state::{RunSeed, RunSnapshot, RunState};
use crate::capabilities::{Artifacts, StepRegistry};
use crate::checkpoint::CheckpointHandle;
use crate::errors::RunError;
use crate::history::{ConversationBuffer, HISTORY_WINDOW};
use crate::llm::LanguageModel;
use crate::memory::{self, MemoryStore};
use crate::router::{QueryRouter, RoutingDecision};
use finrouter_common::Identity;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::Instrument;

/// Timing and windowing knobs, from the `[orchestrator]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub history_window: usize,
    pub step_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            history_window: HISTORY_WINDOW,
            step_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(600),
        }
    }
}

/// One incoming request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub message: String,
    pub identity: Identity,
    pub artifacts: Artifacts,
}

impl RunRequest {
    pub fn new(message: impl Into<String>, identity: Identity) -> Self {
        Self {
            message: message.into(),
            identity,
            artifacts: Artifacts::default(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Artifacts) -> Self {
        self.artifacts = artifacts;
        self
    }
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub response: String,
    pub outcomes: Vec<StepOutcome>,
    pub snapshot: RunSnapshot,
}

/// Drives a request from routing to aggregation.
///
/// Collaborators are injected and shared read-only across concurrent runs.
/// Per-run state lives in a [`RunState`] owned by the call to [`Orchestrator::handle`].
pub struct Orchestrator {
    router: QueryRouter,
    runner: StepRunner,
    aggregator: Aggregator,
    memory: Arc<dyn MemoryStore>,
    buffer: Arc<ConversationBuffer>,
    checkpoints: Option<CheckpointHandle>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: StepRegistry,
        memory: Arc<dyn MemoryStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            router: QueryRouter::new(model.clone(), settings.history_window),
            runner: StepRunner::new(registry, settings.step_timeout),
            aggregator: Aggregator::new(model),
            memory,
            buffer: Arc::new(ConversationBuffer::new(settings.history_window)),
            checkpoints: None,
            settings,
        }
    }

    pub fn with_checkpoints(mut self, checkpoints: CheckpointHandle) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_buffer(mut self, buffer: Arc<ConversationBuffer>) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn buffer(&self) -> &ConversationBuffer {
        &self.buffer
    }

    pub fn checkpoints(&self) -> Option<&CheckpointHandle> {
        self.checkpoints.as_ref()
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.settings
    }

    async fn seed(&self, request: &RunRequest) -> RunSeed {
        RunSeed {
            request: request.message.clone(),
            identity: request.identity.clone(),
            history: self.buffer.snapshot(&request.identity),
            memory_summary: memory::load_summary(self.memory.as_ref(), &request.identity).await,
            artifacts: request.artifacts.clone(),
        }
    }

    /// Route a request without executing it.
    pub async fn plan(&self, request: &RunRequest) -> RoutingDecision {
        let seed = self.seed(request).await;
        self.router
            .plan(&seed.request, &seed.history, &seed.memory_summary)
            .await
    }

    /// Run one request to completion.
    pub async fn handle(&self, request: RunRequest) -> Result<RunReport, RunError> {
        let span = tracing::info_span!("run", thread_id = %request.identity.thread_id());
        async move {
            let seed = self.seed(&request).await;
            let (state, outcomes, result) = self.execute(seed).await;

            match &result {
                Ok(response) => {
                    self.buffer
                        .append_exchange(&request.identity, &request.message, response);
                    memory::save_exchange(self.memory.as_ref(), &request.identity, &request.message, response)
                        .await;
                }
                Err(e) => tracing::error!(error = %e, "Run failed"),
            }

            let snapshot = state.as_ref().map(RunState::snapshot);
            if let Some(snapshot) = &snapshot {
                let error = result.as_ref().err().map(|e| e.kind().to_string());
                self.checkpoint(snapshot.clone(), error).await;
            }

            let response = result?;
            let snapshot = snapshot.ok_or(RunError::NoFinalResponse)?;
            tracing::info!(steps = outcomes.len(), "Run complete");
            Ok(RunReport {
                response,
                outcomes,
                snapshot,
            })
        }
        .instrument(span)
        .await
    }

    /// Route, run steps and aggregate under the run deadline. The state is
    /// returned whenever routing finished, so failed runs can be checkpointed.
    async fn execute(&self, seed: RunSeed) -> (Option<RunState>, Vec<StepOutcome>, Result<String, RunError>) {
        let deadline = Instant::now() + self.settings.run_timeout;
        let deadline_error = || RunError::DeadlineExceeded {
            secs: self.settings.run_timeout.as_secs(),
        };

        let decision = match timeout_at(
            deadline,
            self.router.plan(&seed.request, &seed.history, &seed.memory_summary),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => return (None, Vec::new(), Err(deadline_error())),
        };

        let mut state = RunState::new(seed, decision.plan, decision.rationale, self.settings.history_window);
        if decision.fell_back {
            state.mark_fell_back();
        }

        let mut outcomes = Vec::new();
        loop {
            match next_step(&state) {
                Dispatch::Step(_) => match timeout_at(deadline, self.runner.run(&mut state)).await {
                    Ok(Some(outcome)) => outcomes.push(outcome),
                    Ok(None) => break,
                    Err(_) => return (Some(state), outcomes, Err(deadline_error())),
                },
                Dispatch::Aggregate => break,
            }
        }

        let aggregated = {
            let input = AggregationInput {
                request: state.request(),
                routing_rationale: state.routing_rationale(),
                outputs: state.outputs_by_name(),
                recent_history: state.recent_history(),
                memory_summary: state.memory_summary(),
            };
            match timeout_at(deadline, self.aggregator.aggregate(&input)).await {
                Ok(result) => result,
                Err(_) => Err(deadline_error()),
            }
        };

        let result = aggregated.and_then(|response| {
            state.set_final_response(response);
            state
                .final_response()
                .map(str::to_string)
                .ok_or(RunError::NoFinalResponse)
        });
        (Some(state), outcomes, result)
    }

    async fn checkpoint(&self, snapshot: RunSnapshot, error: Option<String>) {
        let Some(checkpoints) = &self.checkpoints else {
            return;
        };
        if let Err(e) = checkpoints.record(snapshot, error).await {
            tracing::warn!(error = %e, "Failed to record checkpoint");
        }
    }
}
