use super::state::RunState;
use crate::capabilities::{StepInput, StepRegistry};
use crate::errors::StepError;
use finrouter_common::{StepDescriptor, StepKind};
use std::collections::HashMap;
use std::time::Duration;

/// Result of executing one step. Failures are recorded and the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded { kind: StepKind, output: String },
    Failed { kind: StepKind, reason: String },
}

impl StepOutcome {
    pub fn kind(&self) -> StepKind {
        match self {
            StepOutcome::Succeeded { kind, .. } | StepOutcome::Failed { kind, .. } => *kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

/// Concatenate the recorded outputs of a step's dependencies. Dependencies
/// without an output are skipped.
pub fn build_dependency_context(step: &StepDescriptor, outputs: &HashMap<StepKind, String>) -> String {
    let mut context = String::new();
    for dep in &step.depends_on {
        match outputs.get(dep) {
            Some(value) => {
                context.push_str(&format!("Dependency: {} output: {}\n", dep, value));
            }
            None => {
                tracing::debug!(step = %step.kind, dependency = %dep, "Dependency output not available");
            }
        }
    }
    context
}

/// Executes the step at the cursor of a run.
pub struct StepRunner {
    registry: StepRegistry,
    step_timeout: Duration,
}

impl StepRunner {
    pub fn new(registry: StepRegistry, step_timeout: Duration) -> Self {
        Self {
            registry,
            step_timeout,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Run the step at the cursor, record its outcome and advance by one.
    /// Returns `None` without touching the state when the cursor is past the
    /// plan or points at the terminal step.
    pub async fn run(&self, state: &mut RunState) -> Option<StepOutcome> {
        let step = state.current_step()?.clone();
        if step.kind.is_terminal() {
            return None;
        }

        let input = StepInput {
            query: step.query.clone(),
            dependency_context: build_dependency_context(&step, state.outputs()),
            history: state.older_history().to_vec(),
            artifacts: state.artifacts().clone(),
        };

        tracing::info!(step = %step.kind, cursor = state.cursor(), "Dispatching step");
        let outcome = match self.execute(step.kind, input).await {
            Ok(output) => {
                state.record_output(step.kind, output.clone());
                StepOutcome::Succeeded {
                    kind: step.kind,
                    output,
                }
            }
            Err(e) => {
                tracing::warn!(step = %step.kind, error = %e, "Step failed, continuing");
                state.record_failure(step.kind);
                StepOutcome::Failed {
                    kind: step.kind,
                    reason: e.to_string(),
                }
            }
        };
        state.advance();
        Some(outcome)
    }

    async fn execute(&self, kind: StepKind, input: StepInput) -> Result<String, StepError> {
        let capability = self.registry.get(kind).ok_or(StepError::Unregistered(kind))?;
        match tokio::time::timeout(self.step_timeout, capability.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::TimedOut {
                kind,
                secs: self.step_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Artifacts, Capability, FnCapability};
    use crate::orchestrator::state::RunSeed;
    use async_trait::async_trait;
    use finrouter_common::{Identity, Plan, Turn};
    use std::sync::{Arc, Mutex};

    struct SlowCapability;

    #[async_trait]
    impl Capability for SlowCapability {
        async fn execute(&self, _input: StepInput) -> Result<String, StepError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into())
        }
    }

    fn state_with(steps: Vec<StepDescriptor>, history: Vec<Turn>) -> RunState {
        let seed = RunSeed {
            request: "req".into(),
            identity: Identity::new("u", "s"),
            history,
            memory_summary: String::new(),
            artifacts: Artifacts::default(),
        };
        RunState::new(seed, Plan::new(steps).unwrap(), "", 10)
    }

    fn echo_registry(kind: StepKind) -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry
            .register(
                kind,
                Arc::new(FnCapability::new(|input: StepInput| {
                    Ok(format!("echo: {}", input.query))
                })),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_dependency_context_skips_missing() {
        let step = StepDescriptor::new(StepKind::Refiner, "q")
            .with_dependencies([StepKind::DocumentQna, StepKind::News]);
        let mut outputs = HashMap::new();
        outputs.insert(StepKind::DocumentQna, "doc says X".to_string());
        assert_eq!(
            build_dependency_context(&step, &outputs),
            "Dependency: Document_qna output: doc says X\n"
        );
    }

    #[test]
    fn test_dependency_context_preserves_declared_order() {
        let step = StepDescriptor::new(StepKind::Refiner, "q")
            .with_dependencies([StepKind::News, StepKind::DocumentQna]);
        let mut outputs = HashMap::new();
        outputs.insert(StepKind::DocumentQna, "d".to_string());
        outputs.insert(StepKind::News, "n".to_string());
        assert_eq!(
            build_dependency_context(&step, &outputs),
            "Dependency: News output: n\nDependency: Document_qna output: d\n"
        );
    }

    #[test]
    fn test_dependency_context_empty_when_no_dependencies() {
        let step = StepDescriptor::new(StepKind::GeneralQna, "q");
        assert_eq!(build_dependency_context(&step, &HashMap::new()), "");
    }

    #[tokio::test]
    async fn test_run_success_records_and_advances() {
        let runner = StepRunner::new(echo_registry(StepKind::GeneralQna), Duration::from_secs(5));
        let mut state = state_with(vec![StepDescriptor::new(StepKind::GeneralQna, "hello")], vec![]);

        let outcome = runner.run(&mut state).await.unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Succeeded {
                kind: StepKind::GeneralQna,
                output: "echo: hello".into()
            }
        );
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.output(StepKind::GeneralQna), Some("echo: hello"));
        assert_eq!(state.processed_steps(), &[StepKind::GeneralQna]);
    }

    #[tokio::test]
    async fn test_run_failure_records_and_advances() {
        let mut registry = StepRegistry::new();
        registry
            .register(
                StepKind::News,
                Arc::new(FnCapability::new(|_| Err(StepError::Search("down".into())))),
            )
            .unwrap();
        let runner = StepRunner::new(registry, Duration::from_secs(5));
        let mut state = state_with(vec![StepDescriptor::new(StepKind::News, "q")], vec![]);

        let outcome = runner.run(&mut state).await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.kind(), StepKind::News);
        assert_eq!(state.cursor(), 1);
        assert!(state.output(StepKind::News).is_none());
        assert_eq!(state.processed_steps(), &[StepKind::News]);
    }

    #[tokio::test]
    async fn test_run_unregistered_kind_is_failure() {
        let runner = StepRunner::new(StepRegistry::new(), Duration::from_secs(5));
        let mut state = state_with(vec![StepDescriptor::new(StepKind::ImageQna, "q")], vec![]);
        match runner.run(&mut state).await.unwrap() {
            StepOutcome::Failed { reason, .. } => assert!(reason.contains("No capability")),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(state.cursor(), 1);
    }

    #[tokio::test]
    async fn test_run_timeout_is_failure() {
        let mut registry = StepRegistry::new();
        registry.register(StepKind::News, Arc::new(SlowCapability)).unwrap();
        let runner = StepRunner::new(registry, Duration::from_millis(50));
        let mut state = state_with(vec![StepDescriptor::new(StepKind::News, "q")], vec![]);

        match runner.run(&mut state).await.unwrap() {
            StepOutcome::Failed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("Expected timeout, got {:?}", other),
        }
        assert_eq!(state.cursor(), 1);
    }

    #[tokio::test]
    async fn test_run_past_end_or_terminal_is_noop() {
        let runner = StepRunner::new(StepRegistry::new(), Duration::from_secs(5));
        let mut state = state_with(vec![StepDescriptor::new(StepKind::Aggregator, "q")], vec![]);
        assert!(runner.run(&mut state).await.is_none());
        assert_eq!(state.cursor(), 0);
        assert!(state.processed_steps().is_empty());
    }

    #[tokio::test]
    async fn test_run_passes_dependency_context_and_older_history() {
        let seen: Arc<Mutex<Vec<StepInput>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut registry = echo_registry(StepKind::News);
        registry
            .register(
                StepKind::Refiner,
                Arc::new(FnCapability::new(move |input: StepInput| {
                    sink.lock().unwrap().push(input);
                    Ok("refined".into())
                })),
            )
            .unwrap();
        let runner = StepRunner::new(registry, Duration::from_secs(5));
        let history: Vec<Turn> = (0..12).map(|i| Turn::user(i.to_string())).collect();
        let mut state = state_with(
            vec![
                StepDescriptor::new(StepKind::News, "rates"),
                StepDescriptor::new(StepKind::Refiner, "shorten").with_dependencies([StepKind::News]),
            ],
            history,
        );

        runner.run(&mut state).await.unwrap();
        runner.run(&mut state).await.unwrap();

        let inputs = seen.lock().unwrap();
        assert_eq!(inputs[0].dependency_context, "Dependency: News output: echo: rates\n");
        assert_eq!(inputs[0].history.len(), 2);
        assert_eq!(inputs[0].history[1].content, "1");
    }
}
