//! AI pre-fill for the project creation wizard.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::claude_api::ClaudeApiClient;

#[derive(Debug, Clone, Error)]
pub enum SuggestionError {
    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),
}

/// Anything that turns a free-text prompt into a completion.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, prompt: &str) -> Result<String, SuggestionError>;
}

pub const PROJECT_SETUP_SYSTEM_PROMPT: &str = "You help small teams set up projects on a pipeline board. \
     Reply with a single JSON object and nothing else. Allowed keys: name, description, type, \
     milestones (array of strings), tasks (array of strings), budget (number), \
     deadline (YYYY-MM-DD), client_name. Omit keys you cannot infer.";

#[async_trait]
impl SuggestionSource for ClaudeApiClient {
    async fn suggest(&self, prompt: &str) -> Result<String, SuggestionError> {
        self.ask(prompt, Some(PROJECT_SETUP_SYSTEM_PROMPT))
            .await
            .map_err(|e| SuggestionError::Unavailable(e.to_string()))
    }
}

/// Prompt sent for step one of the wizard.
pub fn project_setup_prompt(idea: &str, project_type: Option<&str>) -> String {
    match project_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(kind) => format!("Project type: {kind}\n\nWhat we want to do:\n{}", idea.trim()),
        None => format!("What we want to do:\n{}", idea.trim()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSuggestion {
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    project_type: Option<String>,
    #[serde(default)]
    milestones: Vec<Value>,
    #[serde(default)]
    tasks: Vec<Value>,
    budget: Option<Value>,
    deadline: Option<String>,
    client_name: Option<String>,
}

/// Fields a suggestion may pre-fill. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSuggestion {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_type: Option<String>,
    pub milestones: Vec<String>,
    pub tasks: Vec<String>,
    pub budget: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub client_name: Option<String>,
}

impl ProjectSuggestion {
    /// Parse a completion. `None` means "no suggestions"; callers never treat it as an error.
    pub fn parse(text: &str) -> Option<Self> {
        let json = object_span(text);
        let raw: RawSuggestion = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable project suggestion");
                return None;
            }
        };

        Some(Self {
            name: non_blank(raw.name),
            description: non_blank(raw.description),
            project_type: non_blank(raw.project_type),
            milestones: labels(&raw.milestones),
            tasks: labels(&raw.tasks),
            budget: raw.budget.as_ref().and_then(parse_amount),
            deadline: raw
                .deadline
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
            client_name: non_blank(raw.client_name),
        })
    }
}

/// Outermost `{...}` of a reply, so prose and code fences around it are ignored.
fn object_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Strings, or objects carrying a `title`/`name`.
fn labels(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map
                .get("title")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `2500`, `"2500"` or `"$2,500.00"`.
fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    };
    amount.filter(|amount| amount.is_finite() && *amount >= 0.0)
}
