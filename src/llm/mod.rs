// LLM adapter: OpenAI-compatible chat completions over HTTP. Treated as an
// opaque collaborator: any failure degrades to None/"Other" and never corrupts
// the context it was asked about.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::config::LlmConfig;
use crate::query::FunctionContext;
use crate::risk::RiskReport;

const EXPLAIN_SYSTEM_PROMPT: &str = "You are an expert Python project analyst. Given the code \
structure around a function, you explain what the function does and recommend related functions \
worth reading alongside it.";

const EXPLAIN_USER_TEMPLATE: &str = r#"Below is the analysis result for one function.

1. Explain clearly and in detail what this function does.
2. Recommend other functions worth reading alongside it, most important first. Aim for three or
   more, fewer if little is related. Judge by internal callees, callers, and related flow.

Respond with this JSON only, no other text:
```json
{
  "description": "clear explanation of what the function does",
  "related_functions": [
    {
      "function": "function name",
      "file": "file path (e.g. utils/logger.py)",
      "reason": "why this function is worth reading alongside"
    }
  ]
}
```

Input data:
```json
{context_data}
```
"#;

const RISK_SYSTEM_PROMPT: &str = "You are an expert at assessing the risk of modifying a Python \
function based on its structure and change history.";

const CLASSIFY_SYSTEM_PROMPT: &str = "You are an expert at classifying the purpose of a git \
commit from its diff and message.";

const CLASSIFY_USER_TEMPLATE: &str = r#"Below are the diff and message of one commit.
Classify its purpose as exactly one of:

- Bug&Error
- Feature
- Refactor
- Documentation
- Testing
- Code Style
- Chore
- Other

Output exactly one label from the list, nothing else.

### Commit Message:
{message}

### Diff:
{diff}
"#;

/// Valid output labels for commit classification.
pub const COMMIT_TYPE_LABELS: [&str; 8] = [
    "Bug&Error",
    "Feature",
    "Refactor",
    "Documentation",
    "Testing",
    "Code Style",
    "Chore",
    "Other",
];

/// Free-text explanation of a function, parsed from the model's JSON reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub description: String,
    #[serde(default)]
    pub related_functions: Vec<RelatedFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedFunction {
    pub function: String,
    pub file: String,
    pub reason: String,
}

/// Model commentary on a risk report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskExplanation {
    pub risk_reason: String,
    #[serde(default)]
    pub highlight_factors: Vec<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct LlmClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl LlmClient {
    /// Build a client from config. Returns None when the provider is disabled
    /// or the key variable is unset, so callers can skip LLM steps cleanly.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        if config.provider == "disabled" {
            return None;
        }
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                warn!(
                    "LLM provider '{}' configured but {} is not set; LLM steps disabled",
                    config.provider, config.api_key_env
                );
                return None;
            }
        };
        Some(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn chat(&self, system: &str, user: &str, temperature: f64) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": temperature,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM request rejected")?;

        let body: Value = response.json().await.context("invalid LLM response body")?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("LLM response has no message content"))
    }

    /// Explain the function described by an assembled context. Failure yields
    /// None with a warning.
    pub async fn explain_function(&self, context: &FunctionContext) -> Option<Explanation> {
        let context_json = serde_json::to_string_pretty(context).ok()?;
        let prompt = EXPLAIN_USER_TEMPLATE.replace("{context_data}", &context_json);

        match self.chat(EXPLAIN_SYSTEM_PROMPT, &prompt, 0.3).await {
            Ok(content) => match serde_json::from_str(clean_json_response(&content)) {
                Ok(explanation) => Some(explanation),
                Err(e) => {
                    warn!("LLM explanation was not valid JSON: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("LLM explanation failed: {}", e);
                None
            }
        }
    }

    /// Comment on a computed risk report. Failure yields None with a warning.
    pub async fn explain_risk(&self, report: &RiskReport) -> Option<RiskExplanation> {
        let factors = &report.risk_factors;
        let prompt = format!(
            "Below is the risk analysis for function \"{}\".\n\n\
             - Overall risk score: {} (1-10, higher is riskier)\n\
             [Detailed factors]\n\
             - Function length: {} lines (band: 0-20 points)\n\
             - Internal callee count: {} (band: 0-20 points)\n\
             - Called-by count: {} (band: 0-20 points)\n\
             - Related commit count: {} (band: 0-20 points)\n\
             - Of which Bug&Error commits: {} (band: 0-20 points)\n\n\
             Function code:\n```python\n{}\n```\n\n\
             Respond with this JSON only:\n\
             ```json\n\
             {{\n  \"risk_reason\": \"why modifying this function is risky\",\n  \
             \"highlight_factors\": [\"function_size\", \"bug_commit_count\"]\n}}\n```",
            report.function,
            report.risk_score,
            factors.function_size,
            factors.internal_function_count,
            factors.called_by_count,
            factors.commit_count,
            factors.bug_commit_count,
            report.code,
        );

        match self.chat(RISK_SYSTEM_PROMPT, &prompt, 0.3).await {
            Ok(content) => match serde_json::from_str(clean_json_response(&content)) {
                Ok(explanation) => Some(explanation),
                Err(e) => {
                    warn!("LLM risk explanation was not valid JSON: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("LLM risk explanation failed: {}", e);
                None
            }
        }
    }

    /// Classify one commit's purpose. Anything outside the label set,
    /// including request failure, collapses to "Other".
    pub async fn classify_commit(&self, diff: &str, message: &str) -> String {
        let prompt = CLASSIFY_USER_TEMPLATE
            .replace("{message}", truncate(message, 1000))
            .replace("{diff}", truncate(diff, 3000));

        let content = match self.chat(CLASSIFY_SYSTEM_PROMPT, &prompt, 0.2).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Commit classification failed: {}", e);
                return "Other".to_string();
            }
        };

        let label = content.trim_matches('`').trim();
        if COMMIT_TYPE_LABELS.contains(&label) {
            label.to_string()
        } else {
            "Other".to_string()
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("valid regex"));
static FENCED_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*(.*?)```").expect("valid regex"));

/// Strip a fenced ```json block (or a bare fence) from a model reply, leaving
/// just the JSON payload.
pub fn clean_json_response(text: &str) -> &str {
    let text = text.trim();
    if let Some(captures) = FENCED_JSON.captures(text) {
        return captures.get(1).map(|m| m.as_str().trim()).unwrap_or(text);
    }
    if let Some(captures) = FENCED_ANY.captures(text) {
        return captures.get(1).map(|m| m.as_str().trim()).unwrap_or(text);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_response_fenced() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(clean_json_response(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_response_bare_fence() {
        let reply = "```\n{\"a\": 1}\n```";
        assert_eq!(clean_json_response(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_response_plain() {
        assert_eq!(clean_json_response("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }

    #[test]
    fn test_from_config_disabled() {
        let config = LlmConfig::default();
        assert!(LlmClient::from_config(&config).is_none());
    }

    #[test]
    fn test_explanation_parsing() {
        let raw = r#"{"description": "does things", "related_functions": [
            {"function": "g", "file": "a.py", "reason": "callee"}
        ]}"#;
        let explanation: Explanation = serde_json::from_str(raw).unwrap();
        assert_eq!(explanation.related_functions.len(), 1);
        assert_eq!(explanation.related_functions[0].function, "g");
    }
}
