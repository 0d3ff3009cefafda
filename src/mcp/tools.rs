// Tool handlers for the JSON-RPC server

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::commit::CommitAnalyzer;
use crate::query::engine::QueryEngine;
use crate::risk;

/// Tool failures, mapped to JSON-RPC error codes by the server. NotFound is
/// the 404 equivalent for a function name absent from the index.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn code(&self) -> i32 {
        match self {
            ToolError::NotFound(_) => -32004,
            ToolError::InvalidParams(_) => -32602,
            ToolError::Internal(_) => -32603,
        }
    }
}

fn function_arg(args: &Map<String, Value>) -> Result<&str, ToolError> {
    args.get("function")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidParams("Missing function".to_string()))
}

/// Context tool: the assembled target/internal/caller graph for one name.
pub fn context(engine: &QueryEngine, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let function = function_arg(args)?;

    let context = engine.build_context(function);
    if context.target.is_none() {
        return Err(ToolError::NotFound(format!(
            "Function '{}' not found in index",
            function
        )));
    }

    serde_json::to_value(&context).map_err(|e| ToolError::Internal(e.into()))
}

/// Risk tool: arithmetic score over the context and the function's commit
/// history. Commit classification runs without an LLM here; cached analyses
/// are reused when present.
pub async fn risk(
    engine: &QueryEngine,
    analyzer: &CommitAnalyzer,
    args: &Map<String, Value>,
) -> Result<Value, ToolError> {
    let function = function_arg(args)?;

    let context = engine.build_context(function);
    let Some(target) = context.target.as_ref() else {
        return Err(ToolError::NotFound(format!(
            "Function '{}' not found in index",
            function
        )));
    };

    let commits = match analyzer.load_cached(&target.file, function) {
        Some(cached) => Some(cached),
        None => match analyzer
            .analyze(engine.repo_root(), &target.file, function, None)
            .await
        {
            Ok(analysis) => {
                if let Some(analysis) = &analysis {
                    if let Err(e) = analyzer.save(analysis) {
                        warn!("Failed to cache commit analysis: {}", e);
                    }
                }
                analysis
            }
            Err(e) => {
                warn!("Commit analysis failed for {}: {}", function, e);
                None
            }
        },
    };

    let report = risk::score_target(target, context.internal.len(), commits.as_ref().map(|c| &c.summary));
    serde_json::to_value(&report).map_err(|e| ToolError::Internal(e.into()))
}

/// Stats tool: aggregate counts over the persisted index.
pub fn stats(engine: &QueryEngine, _args: &Map<String, Value>) -> Result<Value, ToolError> {
    let stats = engine.store().stats();
    serde_json::to_value(&stats).map_err(|e| ToolError::Internal(e.into()))
}
