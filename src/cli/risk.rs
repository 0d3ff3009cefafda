use anyhow::Result;
use tracing::warn;

use crate::cli::Workspace;
use crate::llm::LlmClient;
use crate::risk::{self, RiskReport};

pub async fn analyze_risk(
    function: String,
    repo: String,
    no_llm: bool,
    format: String,
) -> Result<()> {
    let workspace = Workspace::open(&repo);
    let engine = workspace.engine()?;

    let context = engine.build_context(&function);
    let Some(target) = context.target.as_ref() else {
        eprintln!("Function '{}' not found in index", function);
        std::process::exit(1);
    };

    let llm = if no_llm {
        None
    } else {
        LlmClient::from_config(&workspace.config.llm)
    };

    // Commit analysis is cached per function; a cache miss runs git log -L.
    let analyzer = workspace.analyzer();
    let commits = match analyzer.load_cached(&target.file, &function) {
        Some(cached) => Some(cached),
        None => {
            let analysis = analyzer
                .analyze(&workspace.repo_root, &target.file, &function, llm.as_ref())
                .await?;
            if let Some(analysis) = &analysis {
                if let Err(e) = analyzer.save(analysis) {
                    warn!("Failed to cache commit analysis: {}", e);
                }
            }
            analysis
        }
    };

    let mut report = risk::score_target(
        target,
        context.internal.len(),
        commits.as_ref().map(|c| &c.summary),
    );

    if let Some(llm) = &llm {
        report.explanation = llm.explain_risk(&report).await;
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        _ => {
            eprintln!("Unknown format: {}", format);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_text(report: &RiskReport) {
    println!("{} ({})", report.function, report.file);
    println!("Risk score: {}/10", report.risk_score);
    println!("\nFactors:");
    println!(
        "  internal calls: {}",
        report.risk_factors.internal_function_count
    );
    println!("  called by: {}", report.risk_factors.called_by_count);
    println!("  function size: {} lines", report.risk_factors.function_size);
    println!("  commits: {}", report.risk_factors.commit_count);
    println!("  bug commits: {}", report.risk_factors.bug_commit_count);

    if let Some(explanation) = &report.explanation {
        println!("\n{}", explanation.risk_reason);
        if !explanation.highlight_factors.is_empty() {
            println!("Key factors: {}", explanation.highlight_factors.join(", "));
        }
    }
}
