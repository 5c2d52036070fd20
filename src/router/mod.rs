//! Router: turns a request into a validated [`Plan`].
//!
//! The planning model's output is untrusted. It is fence-stripped, parsed into
//! [`PlannerOutput`], and validated; any failure along the way, including a
//! failed model call, yields the single-step fallback plan instead of an error.

pub mod prompt;

use crate::history::{format_history, recent_window};
use crate::llm::{LanguageModel, Prompt};
use crate::util::{extract_json_object, strip_code_fence, truncate_chars};
use finrouter_common::{Plan, PlanError, StepDescriptor, StepKind, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use prompt::ROUTER_SYSTEM_PROMPT;

pub const FALLBACK_RATIONALE: &str =
    "The Router could not find any tools for this query, hence returning to Aggregator";

const DEFAULT_REASONING: &str = "Default routing";

/// Raw planner response shape.
#[derive(Debug, Deserialize)]
pub struct PlannerOutput {
    pub agents: Option<Vec<PlannedAgent>>,
    pub reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlannedAgent {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Why planner output was rejected.
#[derive(Debug, Error)]
pub enum PlannerParseError {
    #[error("planner output is not valid JSON: {0}")]
    NotJson(String),

    #[error("planner output has no 'agents' field")]
    MissingAgents,

    #[error("invalid plan: {0}")]
    Invalid(#[from] PlanError),
}

/// A validated plan plus the planner's stated reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub plan: Plan,
    pub rationale: String,
    /// True when the fallback plan replaced the planner's output.
    pub fell_back: bool,
}

impl RoutingDecision {
    pub fn fallback(request: &str) -> Self {
        Self {
            plan: Plan::direct_to_aggregator(request),
            rationale: FALLBACK_RATIONALE.to_string(),
            fell_back: true,
        }
    }
}

/// Parse and validate raw planner text.
pub fn parse_planner_output(raw: &str) -> Result<(Plan, String), PlannerParseError> {
    let body = strip_code_fence(raw);
    let output: PlannerOutput = match serde_json::from_str(body) {
        Ok(output) => output,
        Err(first_err) => {
            // Tolerate prose around a single JSON object.
            let extracted =
                extract_json_object(body).ok_or_else(|| PlannerParseError::NotJson(first_err.to_string()))?;
            serde_json::from_str(&extracted).map_err(|e| PlannerParseError::NotJson(e.to_string()))?
        }
    };

    let agents = output.agents.ok_or(PlannerParseError::MissingAgents)?;
    let mut steps = Vec::with_capacity(agents.len());
    for agent in agents {
        let kind: StepKind = agent.name.parse()?;
        let depends_on = agent
            .dependencies
            .iter()
            .map(|d| d.parse::<StepKind>())
            .collect::<Result<Vec<_>, _>>()?;
        steps.push(StepDescriptor::new(kind, agent.query).with_dependencies(depends_on));
    }
    let plan = Plan::new(steps)?;

    let reasoning = output
        .reasoning
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REASONING.to_string());
    Ok((plan, reasoning))
}

pub struct QueryRouter {
    model: Arc<dyn LanguageModel>,
    history_window: usize,
}

impl QueryRouter {
    pub fn new(model: Arc<dyn LanguageModel>, history_window: usize) -> Self {
        Self {
            model,
            history_window,
        }
    }

    fn build_prompt(&self, request: &str, history: &[Turn], memory_summary: &str) -> Prompt {
        let recent = format_history(recent_window(history, self.history_window));
        Prompt::new(format!(
            "User Query: {}\n\n Conversation History:\n{}\n\n Summarized Memory:\n{}\n",
            request, recent, memory_summary
        ))
        .with_system(ROUTER_SYSTEM_PROMPT)
    }

    /// Produce the plan for a request. Never fails.
    pub async fn plan(&self, request: &str, history: &[Turn], memory_summary: &str) -> RoutingDecision {
        let prompt = self.build_prompt(request, history, memory_summary);

        let raw = match self.model.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Planner call failed, using fallback plan");
                return RoutingDecision::fallback(request);
            }
        };

        match parse_planner_output(&raw) {
            Ok((plan, rationale)) => {
                let kinds: Vec<&str> = plan.kinds().map(|k| k.as_str()).collect();
                tracing::info!(steps = ?kinds, "Routed request");
                RoutingDecision {
                    plan,
                    rationale,
                    fell_back: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    raw = %truncate_chars(&raw, 500),
                    "Planner output rejected, using fallback plan"
                );
                RoutingDecision::fallback(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    fn router_with(reply: &str) -> (QueryRouter, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(reply);
        (QueryRouter::new(model.clone(), 10), model)
    }

    fn assert_fallback(decision: &RoutingDecision, request: &str) {
        assert!(decision.fell_back);
        assert_eq!(decision.rationale, FALLBACK_RATIONALE);
        assert_eq!(decision.plan.len(), 1);
        let step = decision.plan.get(0).unwrap();
        assert_eq!(step.kind, StepKind::Aggregator);
        assert_eq!(step.query, request);
    }

    #[test]
    fn test_parse_valid_output() {
        let raw = r#"{
            "agents": [
                {"name": "News", "query": "rate cuts", "dependencies": []},
                {"name": "Refiner", "query": "summarize", "dependencies": ["News"]}
            ],
            "reasoning": "news then summary"
        }"#;
        let (plan, reasoning) = parse_planner_output(raw).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[1].depends_on, vec![StepKind::News]);
        assert_eq!(reasoning, "news then summary");
    }

    #[test]
    fn test_parse_fenced_output() {
        let raw = "```json\n{\"agents\": [{\"name\": \"General_qna\", \"query\": \"q\"}]}\n```";
        let (plan, reasoning) = parse_planner_output(raw).unwrap();
        assert_eq!(plan.steps()[0].kind, StepKind::GeneralQna);
        assert!(plan.steps()[0].depends_on.is_empty());
        assert_eq!(reasoning, DEFAULT_REASONING);
    }

    #[test]
    fn test_parse_output_with_leading_prose() {
        let raw = "Here you go: {\"agents\": [{\"name\": \"News\", \"query\": \"gold\"}], \"reasoning\": \"r\"}";
        assert!(parse_planner_output(raw).is_ok());
    }

    #[test]
    fn test_parse_output_with_prose_and_brace_in_reasoning() {
        let raw = "Plan below.\n{\"agents\": [{\"name\": \"News\", \"query\": \"gold\"}], \"reasoning\": \"skip the {draft} step}\"}\nThanks!";
        let (plan, reasoning) = parse_planner_output(raw).unwrap();
        assert_eq!(plan.steps()[0].kind, StepKind::News);
        assert_eq!(reasoning, "skip the {draft} step}");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_planner_output("I think you should ask the News agent."),
            Err(PlannerParseError::NotJson(_))
        ));
    }

    #[test]
    fn test_parse_rejects_fenced_malformed() {
        assert!(matches!(
            parse_planner_output("```json\n{\"agents\": [\n```"),
            Err(PlannerParseError::NotJson(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_agents() {
        assert!(matches!(
            parse_planner_output(r#"{"reasoning": "none"}"#),
            Err(PlannerParseError::MissingAgents)
        ));
    }

    #[test]
    fn test_parse_rejects_empty_agents() {
        assert!(matches!(
            parse_planner_output(r#"{"agents": [], "reasoning": "not finance"}"#),
            Err(PlannerParseError::Invalid(PlanError::Empty))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_agent_and_dependency() {
        assert!(matches!(
            parse_planner_output(r#"{"agents": [{"name": "Weather", "query": "q"}]}"#),
            Err(PlannerParseError::Invalid(PlanError::UnknownStepKind(_)))
        ));
        assert!(matches!(
            parse_planner_output(
                r#"{"agents": [{"name": "News", "query": "q", "dependencies": ["Oracle"]}]}"#
            ),
            Err(PlannerParseError::Invalid(PlanError::UnknownStepKind(_)))
        ));
    }

    #[test]
    fn test_parse_accepts_dependency_on_later_step() {
        let raw = r#"{"agents": [
            {"name": "Refiner", "query": "tidy", "dependencies": ["News"]},
            {"name": "News", "query": "gold"}
        ]}"#;
        let (plan, _) = parse_planner_output(raw).unwrap();
        assert_eq!(plan.steps()[0].depends_on, vec![StepKind::News]);
    }

    #[test]
    fn test_parse_rejects_duplicate_kinds() {
        let raw = r#"{"agents": [{"name": "News", "query": "a"}, {"name": "news", "query": "b"}]}"#;
        assert!(matches!(
            parse_planner_output(raw),
            Err(PlannerParseError::Invalid(PlanError::DuplicateStep(StepKind::News)))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_query() {
        assert!(parse_planner_output(r#"{"agents": [{"name": "News"}]}"#).is_err());
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_malformed_output() {
        let (router, _) = router_with("not json at all");
        let decision = router.plan("hello", &[], "This is a fresh conversation").await;
        assert_fallback(&decision, "hello");
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_model_error() {
        let model = Arc::new(ScriptedModel::new());
        model.push_failure("timeout");
        let router = QueryRouter::new(model, 10);
        let decision = router.plan("hello", &[], "").await;
        assert_fallback(&decision, "hello");
    }

    #[tokio::test]
    async fn test_plan_accepts_fenced_output() {
        let (router, _) = router_with(
            "```json\n{\"agents\": [{\"name\": \"News\", \"query\": \"gold\", \"dependencies\": []}], \"reasoning\": \"news\"}\n```",
        );
        let decision = router.plan("gold price news", &[], "").await;
        assert!(!decision.fell_back);
        assert_eq!(decision.rationale, "news");
        assert_eq!(decision.plan.steps()[0].kind, StepKind::News);
    }

    #[tokio::test]
    async fn test_plan_prompt_sees_last_ten_turns_and_memory() {
        let history: Vec<Turn> = (0..15).map(|i| Turn::user(format!("turn-{:02}", i))).collect();
        let (router, model) = router_with(r#"{"agents": []}"#);
        router.plan("latest q", &history, "Summarized memory:\nlikes gold").await;

        let prompt = &model.prompts()[0];
        assert_eq!(prompt.system.as_deref(), Some(ROUTER_SYSTEM_PROMPT));
        assert!(prompt.user.starts_with("User Query: latest q\n\n Conversation History:\n"));
        assert!(!prompt.user.contains("turn-04"));
        assert!(prompt.user.contains("turn-05"));
        assert!(prompt.user.contains("turn-14"));
        assert!(prompt.user.contains("likes gold"));
    }
}
