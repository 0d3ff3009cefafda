use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::Workspace;
use crate::indexer::watcher::FileWatcher;
use crate::indexer::{IndexOutcome, Indexer};

pub async fn index_project(repo: String, rebuild: bool, watch: bool) -> Result<()> {
    info!("Indexing repository: {}", repo);

    let workspace = Workspace::open(&repo);

    if rebuild && workspace.trees_dir.exists() {
        info!("Rebuilding index at {}", workspace.trees_dir.display());
        std::fs::remove_dir_all(&workspace.trees_dir)?;
    }

    let indexer = Indexer::new(workspace.store()?, workspace.config.indexing.clone());
    let files = indexer.collect_source_files(&workspace.repo_root);

    println!("repolens indexer");
    println!("Repository: {}", workspace.repo_root.display());
    println!("Index: {}", workspace.trees_dir.display());
    println!("Source files: {}", files.len());

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .expect("valid progress template"),
    );

    let mut indexed = 0usize;
    let mut functions = 0usize;
    let mut skipped = 0usize;
    for path in &files {
        bar.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        match indexer.index_file(&workspace.repo_root, path)? {
            IndexOutcome::Indexed { functions: count, .. } => {
                indexed += 1;
                functions += count;
            }
            IndexOutcome::Skipped => skipped += 1,
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!("\nIndexing complete!");
    println!("Files indexed: {}", indexed);
    println!("Functions: {}", functions);
    if skipped > 0 {
        println!("Files skipped (unreadable or syntax errors): {}", skipped);
    }

    let should_watch = watch || workspace.config.indexing.watch;
    if should_watch {
        println!("\nWatching for changes. Press Ctrl+C to stop.");
        let watcher = FileWatcher::new(Arc::new(indexer), workspace.repo_root.clone());
        watcher.watch().await?;
    }

    Ok(())
}
