use anyhow::Result;
use chrono::TimeZone;

use crate::cli::Workspace;
use crate::repo;

pub async fn show_stats(repo: String, tree: bool) -> Result<()> {
    let workspace = Workspace::open(&repo);
    let store = workspace.store()?;
    let stats = store.stats();

    println!("repolens index statistics");
    println!("Repository: {}", workspace.repo_root.display());
    println!("Indexed files: {}", stats.total_files);
    println!("Indexed functions: {}", stats.total_functions);
    match stats.last_indexed {
        Some(ts) => match chrono::Utc.timestamp_opt(ts, 0).single() {
            Some(dt) => println!("Last indexed: {}", dt.to_rfc3339()),
            None => println!("Last indexed: {}", ts),
        },
        None => println!("Last indexed: never"),
    }

    if tree {
        let file_tree = repo::build_file_tree(&workspace.repo_root)?;
        println!("\n{}", serde_json::to_string_pretty(&file_tree)?);
    }

    Ok(())
}
