//! Shared domain types for the finrouter step orchestrator.
//!
//! These types cross every module boundary: the router produces a [`Plan`],
//! the step runner walks it, and the transport layer speaks [`Identity`] and
//! [`Turn`]. Keeping them here lets the capability implementations depend on
//! the vocabulary without pulling in the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kind of a processing step. Wire names match the planner's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepKind {
    #[serde(rename = "Document_qna")]
    DocumentQna,
    #[serde(rename = "News")]
    News,
    #[serde(rename = "General_qna")]
    GeneralQna,
    #[serde(rename = "Image_qna")]
    ImageQna,
    #[serde(rename = "Refiner")]
    Refiner,
    #[serde(rename = "Aggregator")]
    Aggregator,
}

impl StepKind {
    /// Every step kind, in the order the router prompt lists them.
    pub const ALL: [StepKind; 6] = [
        StepKind::DocumentQna,
        StepKind::News,
        StepKind::ImageQna,
        StepKind::GeneralQna,
        StepKind::Refiner,
        StepKind::Aggregator,
    ];

    /// Name used by the planner and in recorded outputs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::DocumentQna => "Document_qna",
            StepKind::News => "News",
            StepKind::GeneralQna => "General_qna",
            StepKind::ImageQna => "Image_qna",
            StepKind::Refiner => "Refiner",
            StepKind::Aggregator => "Aggregator",
        }
    }

    /// The aggregator ends a run; it is never dispatched to a capability.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepKind::Aggregator)
    }

    /// Which uploaded artifact, if any, the step cannot run without.
    pub fn required_artifact(&self) -> Option<ArtifactKind> {
        match self {
            StepKind::DocumentQna => Some(ArtifactKind::Document),
            StepKind::ImageQna => Some(ArtifactKind::Image),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = PlanError;

    /// Case-insensitive match against the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PlanError::UnknownStepKind(s.to_string()))
    }
}

/// Uploaded artifacts a step may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Document,
    Image,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Document => write!(f, "document"),
            ArtifactKind::Image => write!(f, "image"),
        }
    }
}

/// One entry of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub kind: StepKind,
    pub query: String,
    /// Prior step kinds whose outputs feed this step.
    #[serde(default)]
    pub depends_on: Vec<StepKind>,
}

impl StepDescriptor {
    pub fn new(kind: StepKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, depends_on: impl IntoIterator<Item = StepKind>) -> Self {
        self.depends_on = depends_on.into_iter().collect();
        self
    }
}

/// Reasons a candidate plan is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,

    #[error("unknown step kind '{0}'")]
    UnknownStepKind(String),

    #[error("step kind {0} appears more than once")]
    DuplicateStep(StepKind),
}

/// An ordered, non-empty list of step descriptors. Each kind appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    steps: Vec<StepDescriptor>,
}

impl Plan {
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = Vec::with_capacity(steps.len());
        for step in &steps {
            if seen.contains(&step.kind) {
                return Err(PlanError::DuplicateStep(step.kind));
            }
            seen.push(step.kind);
        }
        Ok(Self { steps })
    }

    /// Single-step plan that goes straight to the aggregator.
    pub fn direct_to_aggregator(query: impl Into<String>) -> Self {
        Self {
            steps: vec![StepDescriptor::new(StepKind::Aggregator, query)],
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepDescriptor> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn kinds(&self) -> impl Iterator<Item = StepKind> + '_ {
        self.steps.iter().map(|s| s.kind)
    }

    pub fn is_direct_to_aggregator(&self) -> bool {
        self.steps.len() == 1 && self.steps[0].kind.is_terminal()
    }
}

impl<'de> Deserialize<'de> for Plan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            steps: Vec<StepDescriptor>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Plan::new(raw.steps).map_err(serde::de::Error::custom)
    }
}

/// Caller-supplied identity that partitions conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub session_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Key used for conversation buffers and checkpoints.
    pub fn thread_id(&self) -> String {
        format!("{}-{}", self.user_id, self.session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One prior conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_kind_round_trips_wire_names() {
        for kind in StepKind::ALL {
            assert_eq!(kind.as_str().parse::<StepKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_step_kind_parse_is_case_insensitive() {
        assert_eq!("document_QNA".parse::<StepKind>().unwrap(), StepKind::DocumentQna);
        assert_eq!(" news ".parse::<StepKind>().unwrap(), StepKind::News);
    }

    #[test]
    fn test_step_kind_parse_unknown() {
        let err = "Weather".parse::<StepKind>().unwrap_err();
        assert_eq!(err, PlanError::UnknownStepKind("Weather".to_string()));
    }

    #[test]
    fn test_step_kind_serde_uses_wire_name() {
        let json = serde_json::to_string(&StepKind::GeneralQna).unwrap();
        assert_eq!(json, "\"General_qna\"");
        let kind: StepKind = serde_json::from_str("\"Image_qna\"").unwrap();
        assert_eq!(kind, StepKind::ImageQna);
    }

    #[test]
    fn test_required_artifacts() {
        assert_eq!(StepKind::DocumentQna.required_artifact(), Some(ArtifactKind::Document));
        assert_eq!(StepKind::ImageQna.required_artifact(), Some(ArtifactKind::Image));
        assert_eq!(StepKind::News.required_artifact(), None);
    }

    #[test]
    fn test_plan_rejects_empty() {
        assert_eq!(Plan::new(vec![]).unwrap_err(), PlanError::Empty);
    }

    #[test]
    fn test_plan_rejects_duplicate_kind() {
        let steps = vec![
            StepDescriptor::new(StepKind::News, "a"),
            StepDescriptor::new(StepKind::News, "b"),
        ];
        assert_eq!(
            Plan::new(steps).unwrap_err(),
            PlanError::DuplicateStep(StepKind::News)
        );
    }

    #[test]
    fn test_direct_to_aggregator_plan() {
        let plan = Plan::direct_to_aggregator("hello");
        assert_eq!(plan.len(), 1);
        assert!(plan.is_direct_to_aggregator());
        assert_eq!(plan.get(0).unwrap().query, "hello");
        assert!(plan.get(1).is_none());
    }

    #[test]
    fn test_plan_deserialize_validates() {
        let ok: Plan = serde_json::from_str(
            r#"{"steps":[{"kind":"News","query":"rates"},{"kind":"Refiner","query":"sum","depends_on":["News"]}]}"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.steps()[1].depends_on, vec![StepKind::News]);

        let dup = serde_json::from_str::<Plan>(
            r#"{"steps":[{"kind":"News","query":"a"},{"kind":"News","query":"b"}]}"#,
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_thread_id_joins_user_and_session() {
        let id = Identity::new("alice", "s1");
        assert_eq!(id.thread_id(), "alice-s1");
    }

    #[test]
    fn test_turn_constructors() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("yo").role.label(), "Assistant");
    }
}
