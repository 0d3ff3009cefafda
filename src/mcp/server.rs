// JSON-RPC stdio server exposing context queries to tool-calling clients

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, Write};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::commit::CommitAnalyzer;
use crate::mcp::tools::{self, ToolError};
use crate::query::engine::QueryEngine;

/// JSON-RPC message
#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcMessage {
    jsonrpc: String,
    id: Option<Value>,
    method: Option<String>,
    params: Option<Value>,
    result: Option<Value>,
}

/// Tool definition advertised to clients
#[derive(Debug, Serialize, Deserialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerCapabilities {
    tools: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct InitializeResult {
    protocol_version: String,
    capabilities: ServerCapabilities,
    server_info: ServerInfo,
}

/// Stdio JSON-RPC server over a populated index.
pub struct McpServer {
    engine: QueryEngine,
    analyzer: CommitAnalyzer,
}

impl McpServer {
    pub fn new(engine: QueryEngine, analyzer: CommitAnalyzer) -> Self {
        Self { engine, analyzer }
    }

    /// Run the server until stdin closes.
    pub async fn run(self) -> Result<()> {
        info!("Starting repolens server");

        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            for line in io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error reading from stdin: {}", e);
                        break;
                    }
                }
            }
        });

        while let Some(line) = rx.recv().await {
            debug!("Received: {}", line);

            match self.handle_message(&line).await {
                Ok(Some(response)) => {
                    println!("{}", response);
                    io::stdout().flush()?;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Error handling message: {}", e);
                    let error_response = json!({
                        "jsonrpc": "2.0",
                        "id": null,
                        "error": {
                            "code": -32603,
                            "message": format!("Internal error: {}", e)
                        }
                    });
                    println!("{}", error_response);
                    io::stdout().flush()?;
                }
            }
        }

        Ok(())
    }

    async fn handle_message(&self, message: &str) -> Result<Option<String>> {
        let msg: JsonRpcMessage = serde_json::from_str(message)?;

        match msg.method.as_deref() {
            Some("initialize") => {
                let result = InitializeResult {
                    protocol_version: "2024-11-05".to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(json!({})),
                    },
                    server_info: ServerInfo {
                        name: "repolens".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };

                let response = json!({
                    "jsonrpc": "2.0",
                    "id": msg.id,
                    "result": result
                });
                Ok(Some(serde_json::to_string(&response)?))
            }

            Some("tools/list") => {
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": msg.id,
                    "result": { "tools": self.list_tools() }
                });
                Ok(Some(serde_json::to_string(&response)?))
            }

            Some("tools/call") => {
                let response = match &msg.params {
                    Some(params) => match self.call_tool(params).await {
                        Ok(result) => json!({
                            "jsonrpc": "2.0",
                            "id": msg.id,
                            "result": result
                        }),
                        Err(e) => json!({
                            "jsonrpc": "2.0",
                            "id": msg.id,
                            "error": {
                                "code": e.code(),
                                "message": e.to_string()
                            }
                        }),
                    },
                    None => json!({
                        "jsonrpc": "2.0",
                        "id": msg.id,
                        "error": {
                            "code": -32602,
                            "message": "Invalid params"
                        }
                    }),
                };
                Ok(Some(serde_json::to_string(&response)?))
            }

            Some("shutdown") => {
                info!("Received shutdown request");
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": msg.id,
                    "result": null
                });
                Ok(Some(serde_json::to_string(&response)?))
            }

            _ => {
                let error = json!({
                    "jsonrpc": "2.0",
                    "id": msg.id,
                    "error": {
                        "code": -32601,
                        "message": "Method not found"
                    }
                });
                Ok(Some(serde_json::to_string(&error)?))
            }
        }
    }

    fn list_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "repolens_context".to_string(),
                description: "Resolve a function's definition, internal callees, and callers"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "function": {
                            "type": "string",
                            "description": "Function name to resolve"
                        }
                    },
                    "required": ["function"]
                }),
            },
            Tool {
                name: "repolens_risk".to_string(),
                description: "Score the modification risk of a function from its context and commit history"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "function": {
                            "type": "string",
                            "description": "Function name to score"
                        }
                    },
                    "required": ["function"]
                }),
            },
            Tool {
                name: "repolens_stats".to_string(),
                description: "Get index statistics".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        ]
    }

    async fn call_tool(&self, params: &Value) -> Result<Value, ToolError> {
        let tool_name = params["name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("Missing tool name".to_string()))?;
        let args = params["arguments"]
            .as_object()
            .ok_or_else(|| ToolError::InvalidParams("Invalid arguments".to_string()))?;

        match tool_name {
            "repolens_context" => tools::context(&self.engine, args),
            "repolens_risk" => tools::risk(&self.engine, &self.analyzer, args).await,
            "repolens_stats" => tools::stats(&self.engine, args),
            _ => Err(ToolError::InvalidParams(format!(
                "Unknown tool: {}",
                tool_name
            ))),
        }
    }
}
