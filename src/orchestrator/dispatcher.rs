use super::state::RunState;
use finrouter_common::StepKind;

/// Where control goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Step(StepKind),
    Aggregate,
}

/// Select the next target from the cursor. A planned Aggregator step and an
/// exhausted plan both go to aggregation.
pub fn next_step(state: &RunState) -> Dispatch {
    match state.current_step() {
        Some(step) if !step.kind.is_terminal() => Dispatch::Step(step.kind),
        _ => Dispatch::Aggregate,
    }
}
