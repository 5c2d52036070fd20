use crate::capabilities::Artifacts;
use crate::history::{older_portion, recent_window};
use chrono::{DateTime, Utc};
use finrouter_common::{Identity, Plan, StepDescriptor, StepKind, Turn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Inputs that exist before routing.
#[derive(Debug, Clone)]
pub struct RunSeed {
    pub request: String,
    pub identity: Identity,
    pub history: Vec<Turn>,
    pub memory_summary: String,
    pub artifacts: Artifacts,
}

/// Per-request execution state, owned by exactly one in-flight run.
///
/// The plan is fixed at construction. The cursor only moves forward through
/// [`RunState::advance`], and the final response can be set once.
#[derive(Debug, Clone)]
pub struct RunState {
    request: String,
    identity: Identity,
    plan: Plan,
    routing_rationale: String,
    fell_back: bool,
    cursor: usize,
    outputs: HashMap<StepKind, String>,
    processed_steps: Vec<StepKind>,
    history: Vec<Turn>,
    history_window: usize,
    memory_summary: String,
    artifacts: Artifacts,
    final_response: Option<String>,
    started_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(seed: RunSeed, plan: Plan, routing_rationale: impl Into<String>, history_window: usize) -> Self {
        Self {
            request: seed.request,
            identity: seed.identity,
            plan,
            routing_rationale: routing_rationale.into(),
            fell_back: false,
            cursor: 0,
            outputs: HashMap::new(),
            processed_steps: Vec::new(),
            history: seed.history,
            history_window,
            memory_summary: seed.memory_summary,
            artifacts: seed.artifacts,
            final_response: None,
            started_at: Utc::now(),
        }
    }

    pub fn mark_fell_back(&mut self) {
        self.fell_back = true;
    }

    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn routing_rationale(&self) -> &str {
        &self.routing_rationale
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The descriptor at the cursor, if the plan is not exhausted.
    pub fn current_step(&self) -> Option<&StepDescriptor> {
        self.plan.get(self.cursor)
    }

    /// Move the cursor forward by one, never past the end of the plan.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.plan.len());
    }

    pub fn outputs(&self) -> &HashMap<StepKind, String> {
        &self.outputs
    }

    pub fn output(&self, kind: StepKind) -> Option<&str> {
        self.outputs.get(&kind).map(String::as_str)
    }

    /// Outputs keyed by wire name, in sorted order.
    pub fn outputs_by_name(&self) -> BTreeMap<String, String> {
        self.outputs
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }

    /// Record a successful step.
    pub fn record_output(&mut self, kind: StepKind, output: String) {
        self.outputs.insert(kind, output);
        self.processed_steps.push(kind);
    }

    /// Record a failed step. Its output stays unset.
    pub fn record_failure(&mut self, kind: StepKind) {
        self.processed_steps.push(kind);
    }

    pub fn processed_steps(&self) -> &[StepKind] {
        &self.processed_steps
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Turns shown to routing and aggregation.
    pub fn recent_history(&self) -> &[Turn] {
        recent_window(&self.history, self.history_window)
    }

    /// Turns shown to individual steps.
    pub fn older_history(&self) -> &[Turn] {
        older_portion(&self.history, self.history_window)
    }

    pub fn memory_summary(&self) -> &str {
        &self.memory_summary
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    /// Set the final response. Returns false, leaving the first value in
    /// place, if one was already set.
    pub fn set_final_response(&mut self, response: String) -> bool {
        if self.final_response.is_some() {
            return false;
        }
        self.final_response = Some(response);
        true
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            thread_id: self.identity.thread_id(),
            request: self.request.clone(),
            plan: self.plan.clone(),
            routing_rationale: self.routing_rationale.clone(),
            fell_back: self.fell_back,
            cursor: self.cursor,
            outputs: self.outputs_by_name(),
            processed_steps: self.processed_steps.clone(),
            final_response: self.final_response.clone(),
            started_at: self.started_at,
        }
    }
}

/// Serializable view of a run, used for checkpoints and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub thread_id: String,
    pub request: String,
    pub plan: Plan,
    pub routing_rationale: String,
    pub fell_back: bool,
    pub cursor: usize,
    pub outputs: BTreeMap<String, String>,
    pub processed_steps: Vec<StepKind>,
    pub final_response: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(request: &str) -> RunSeed {
        RunSeed {
            request: request.to_string(),
            identity: Identity::new("u", "s"),
            history: Vec::new(),
            memory_summary: String::new(),
            artifacts: Artifacts::default(),
        }
    }

    fn two_step_plan() -> Plan {
        Plan::new(vec![
            StepDescriptor::new(StepKind::News, "a"),
            StepDescriptor::new(StepKind::Refiner, "b"),
        ])
        .unwrap()
    }

    #[test]
    fn test_advance_moves_by_one_and_clamps() {
        let mut state = RunState::new(seed("q"), two_step_plan(), "r", 10);
        assert_eq!(state.cursor(), 0);
        state.advance();
        assert_eq!(state.cursor(), 1);
        state.advance();
        assert_eq!(state.cursor(), 2);
        state.advance();
        assert_eq!(state.cursor(), 2);
        assert!(state.current_step().is_none());
    }

    #[test]
    fn test_record_output_and_failure() {
        let mut state = RunState::new(seed("q"), two_step_plan(), "r", 10);
        state.record_failure(StepKind::News);
        state.record_output(StepKind::Refiner, "done".into());
        assert_eq!(state.processed_steps(), &[StepKind::News, StepKind::Refiner]);
        assert!(state.output(StepKind::News).is_none());
        assert_eq!(state.output(StepKind::Refiner), Some("done"));
    }

    #[test]
    fn test_final_response_set_once() {
        let mut state = RunState::new(seed("q"), two_step_plan(), "r", 10);
        assert!(state.set_final_response("first".into()));
        assert!(!state.set_final_response("second".into()));
        assert_eq!(state.final_response(), Some("first"));
    }

    #[test]
    fn test_history_views() {
        let mut s = seed("q");
        s.history = (0..15).map(|i| Turn::user(i.to_string())).collect();
        let state = RunState::new(s, two_step_plan(), "r", 10);
        assert_eq!(state.recent_history().len(), 10);
        assert_eq!(state.recent_history()[0].content, "5");
        assert_eq!(state.older_history().len(), 5);
        assert_eq!(state.older_history()[4].content, "4");
    }

    #[test]
    fn test_snapshot_uses_wire_names() {
        let mut state = RunState::new(seed("q"), two_step_plan(), "why", 10);
        state.record_output(StepKind::News, "n".into());
        let snap = state.snapshot();
        assert_eq!(snap.thread_id, "u-s");
        assert_eq!(snap.outputs.get("News").map(String::as_str), Some("n"));
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["processed_steps"][0], "News");
        assert_eq!(json["routing_rationale"], "why");
    }
}
