//! Financial news step: the model formulates a search query, the search
//! backend fetches recent articles, and the model summarizes them with sources.

use super::prompts::{NEWS_ANALYSIS_SYSTEM_PROMPT, NEWS_QUERY_SYSTEM_PROMPT};
use super::{Capability, StepInput};
use crate::errors::StepError;
use crate::llm::{LanguageModel, Prompt};
use crate::util::truncate_chars;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Per-article cap on content passed to the analysis call.
const MAX_ARTICLE_CHARS: usize = 6000;

/// Search parameters, taken from the `[search]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_results: u32,
    pub topic: String,
    pub time_range: String,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 3,
            topic: "finance".to_string(),
            time_range: "month".to_string(),
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
        }
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Short snippet.
    #[serde(default)]
    pub content: String,
    /// Full extracted page text, when the backend provides it.
    #[serde(default)]
    pub raw_content: Option<String>,
}

impl SearchHit {
    fn best_text(&self) -> &str {
        match self.raw_content.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => &self.content,
        }
    }
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>>;
}

// ── Tavily ──────────────────────────────────────────────────────────

pub struct TavilyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: TAVILY_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl NewsSearch for TavilyClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let mut body = serde_json::json!({
            "query": query,
            "topic": options.topic,
            "time_range": options.time_range,
            "max_results": options.max_results,
            "include_raw_content": true,
        });
        if !options.include_domains.is_empty() {
            body["include_domains"] = serde_json::json!(options.include_domains);
        }
        if !options.exclude_domains.is_empty() {
            body["exclude_domains"] = serde_json::json!(options.exclude_domains);
        }

        let response: TavilyResponse = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach Tavily")?
            .error_for_status()
            .context("Tavily rejected the search")?
            .json()
            .await
            .context("Failed to parse Tavily response")?;
        Ok(response.results)
    }
}

/// Fixed-result search for tests and offline runs.
#[derive(Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    fail_with: Option<String>,
}

impl StaticSearch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            fail_with: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl NewsSearch for StaticSearch {
    async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<Vec<SearchHit>> {
        if let Some(message) = &self.fail_with {
            anyhow::bail!("{}", message);
        }
        Ok(self.hits.clone())
    }
}

// ── Capability ──────────────────────────────────────────────────────

pub struct NewsQna {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn NewsSearch>,
    options: SearchOptions,
}

impl NewsQna {
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn NewsSearch>, options: SearchOptions) -> Self {
        Self {
            model,
            search,
            options,
        }
    }

    async fn formulate_query(&self, input: &StepInput) -> Result<String, StepError> {
        let prompt = Prompt::new(input.prompt_text()).with_system(NEWS_QUERY_SYSTEM_PROMPT);
        let raw = self.model.complete(&prompt).await?;
        let query = raw.trim().trim_matches('"').trim().to_string();
        if query.is_empty() {
            return Err(StepError::Failed("model produced an empty search query".to_string()));
        }
        Ok(query)
    }
}

#[async_trait]
impl Capability for NewsQna {
    async fn execute(&self, input: StepInput) -> Result<String, StepError> {
        let search_query = self.formulate_query(&input).await?;
        tracing::debug!(search_query = %search_query, "Formulated news search");

        let hits = self
            .search
            .search(&format!("latest financial news on {}", search_query), &self.options)
            .await
            .map_err(|e| StepError::Search(format!("{:#}", e)))?;

        if hits.is_empty() {
            return Ok(format!("No recent financial news found for: {}", search_query));
        }

        let mut articles = String::new();
        let mut sources = Vec::new();
        for hit in &hits {
            let text = hit.best_text().trim();
            if text.is_empty() {
                tracing::debug!(url = %hit.url, "No content for search hit");
                continue;
            }
            articles.push_str(&format!(
                "\n\n--- Article from {} ---\n{}",
                hit.url,
                truncate_chars(text, MAX_ARTICLE_CHARS)
            ));
            sources.push(hit.url.as_str());
        }

        if sources.is_empty() {
            return Ok(format!(
                "Could not extract content from any of the found articles for: {}",
                search_query
            ));
        }

        let analysis_input = format!(
            "Original Input: {}\nOptimized Search: {}\n\nArticle Content:{}",
            input.query, search_query, articles
        );
        let analysis = self
            .model
            .complete(&Prompt::new(analysis_input).with_system(NEWS_ANALYSIS_SYSTEM_PROMPT))
            .await?;

        let source_lines: Vec<String> = sources.iter().map(|url| format!("- {}", url)).collect();
        Ok(format!(
            "**Search Query Used**: {}\n\n{}\n\n**Sources**:\n{}",
            search_query,
            analysis.trim(),
            source_lines.join("\n")
        ))
    }
}
