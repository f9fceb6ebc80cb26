use std::{collections::HashSet, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Failed to read target list {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn read_targets(path: impl AsRef<Path>) -> Result<Vec<String>, TargetError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| TargetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_targets(&content))
}

pub fn parse_targets(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Drops repeated targets, keeping the first occurrence in place.
pub fn dedup_targets(targets: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(targets.len());
    targets
        .into_iter()
        .filter(|target| seen.insert(target.clone()))
        .collect()
}
