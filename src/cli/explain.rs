use anyhow::{bail, Result};

use crate::cli::Workspace;
use crate::llm::LlmClient;

pub async fn explain_function(function: String, repo: String) -> Result<()> {
    let workspace = Workspace::open(&repo);
    let engine = workspace.engine()?;

    let context = engine.build_context(&function);
    if context.target.is_none() {
        eprintln!("Function '{}' not found in index", function);
        std::process::exit(1);
    }

    let Some(llm) = LlmClient::from_config(&workspace.config.llm) else {
        bail!(
            "LLM provider is disabled; set [llm] provider and {} to use explain",
            workspace.config.llm.api_key_env
        );
    };

    match llm.explain_function(&context).await {
        Some(explanation) => {
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
        None => {
            eprintln!("Explanation failed; the context itself is unaffected");
            std::process::exit(1);
        }
    }

    Ok(())
}
