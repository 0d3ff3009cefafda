use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::repo;

pub async fn clone_repository(url: String, branch: Option<String>, dest: Option<String>) -> Result<()> {
    let config = Config::from_project_dir(".");

    let dest_dir = match dest {
        Some(dest) => PathBuf::from(dest),
        None => PathBuf::from(&config.storage.data_dir).join("repos"),
    };

    let repo_path = repo::clone_repo(&url, &dest_dir, branch.as_deref())?;
    println!("Repository ready at: {}", repo_path.display());
    println!(
        "Next: repolens index --repo {}",
        repo_path.display()
    );

    Ok(())
}
