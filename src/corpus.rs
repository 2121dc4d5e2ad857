//! Filesystem corpus loader.
//!
//! Walks `[corpus].root`, keeps files matching the include globs and not
//! matching the exclude globs, and turns each into a [`Document`] whose id
//! is the path relative to the root. Ground-truth files refer to sources by
//! that same relative path.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ragbench_core::models::Document;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;

/// Load every matching file under the corpus root, sorted by id.
pub fn load_corpus(config: &CorpusConfig) -> Result<Vec<Document>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match file_to_document(path, &rel_str) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!(path = %rel_str, error = %e, "skipping unreadable file"),
        }
    }

    docs.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(root = %root.display(), documents = docs.len(), "corpus loaded");
    Ok(docs)
}

fn file_to_document(path: &Path, relative_path: &str) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document::new(relative_path, text).with_source(
        format!("file://{}", path.display()),
        format_for(path),
    ))
}

/// Content format label from the file extension.
fn format_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("mdx") | Some("markdown") => "markdown",
        Some("rs") | Some("py") | Some("ts") | Some("js") | Some("go") | Some("java") => "code",
        Some("vtt") | Some("srt") => "transcript",
        _ => "text",
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
