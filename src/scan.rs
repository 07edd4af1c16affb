use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use globset::GlobBuilder;

use crate::error::{Error, Result};

/// Walk `input_dir` and collect every file whose path relative to it matches
/// `mask`. The mask follows glob rules, `*` does not cross directory
/// separators and matching is case-insensitive, so "**/*.mp3" also picks up
/// ".MP3" files.
pub async fn discover_tracks(input_dir: &Path, mask: &str) -> Result<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(mask)
        .literal_separator(true)
        .case_insensitive(true)
        .build()
        .map_err(|err| Error::Config(format!("invalid file mask '{mask}': {err}")))?
        .compile_matcher();

    let root = input_dir.canonicalize().map_err(|_| {
        Error::Config(format!(
            "input directory '{}' does not exist",
            input_dir.display()
        ))
    })?;

    let start_time = Instant::now();
    let mut files = Vec::new();
    let mut pending = VecDeque::new();
    pending.push_back(root.clone());
    while let Some(dir) = pending.pop_front() {
        let mut readdir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = readdir.next_entry().await? {
            let path = entry.path();
            if path.is_symlink() {
                tracing::warn!("skipping symlinked path '{}'", path.display());
                continue;
            }
            if path.is_dir() {
                pending.push_back(path);
            } else if let Ok(relative) = path.strip_prefix(&root) {
                if matcher.is_match(relative) {
                    files.push(path);
                }
            }
        }
    }

    tracing::debug!(
        "found {} files matching '{}' in {:?}",
        files.len(),
        mask,
        start_time.elapsed()
    );
    Ok(files)
}

/// First step file in a song folder, if any. A missing folder reads as empty.
pub fn step_file_in(dir: &Path) -> Option<PathBuf> {
    first_with_extension(dir, "sm")
}

/// First audio file in a song folder, if any.
pub fn audio_file_in(dir: &Path) -> Option<PathBuf> {
    first_with_extension(dir, "mp3")
}

fn first_with_extension(dir: &Path, wanted: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted));
        if matches && path.is_file() {
            return Some(path);
        }
    }
    None
}
