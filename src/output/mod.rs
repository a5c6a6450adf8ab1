use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::reconcile::PublishedSets;

/// Locations of the two written lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub allow: PathBuf,
    pub disposable: PathBuf,
}

/// Writes both published sets into `dir`, creating it if needed.
///
/// # Arguments
/// * `dir` - Output directory
/// * `allow_filename` - File name for the allowlist
/// * `disposable_filename` - File name for the disposable list
/// * `sets` - Finalized sets, written one sorted domain per line
///
/// # Returns
/// * `Result<OutputPaths>` - Paths of the two files written or an error
pub async fn write_sets(
    dir: &Path,
    allow_filename: &str,
    disposable_filename: &str,
    sets: &PublishedSets,
) -> Result<OutputPaths> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let paths = OutputPaths {
        allow: dir.join(allow_filename),
        disposable: dir.join(disposable_filename),
    };

    write_list(&paths.allow, &sets.allow).await?;
    write_list(&paths.disposable, &sets.disposable).await?;

    info!(
        "Published {} allowlisted and {} disposable domains to {}",
        sets.allow.len(),
        sets.disposable.len(),
        dir.display()
    );
    Ok(paths)
}

/// One domain per line, sorted, with a trailing newline.
pub fn render(domains: &BTreeSet<String>) -> String {
    let mut body = String::with_capacity(domains.len() * 16);
    for domain in domains {
        body.push_str(domain);
        body.push('\n');
    }
    body
}

async fn write_list(path: &Path, domains: &BTreeSet<String>) -> Result<()> {
    debug!("Writing {} domains to {}", domains.len(), path.display());
    tokio::fs::write(path, render(domains))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
