//! `rbench search`: rank chunks against a query and print the hits.

use anyhow::Result;
use ragbench_core::index::BackendKind;

use crate::config::Config;
use crate::pipeline;

const PREVIEW_CHARS: usize = 160;

pub async fn run_search(
    config: &Config,
    query: &str,
    backend: Option<BackendKind>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let (_, index) = pipeline::build_index(config, backend).await?;
    let limit = limit.unwrap_or(config.index.top_k);
    let results = index.query(query, limit).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for r in &results {
        println!(
            "{}. [{:.4}] {} (chars {}..{})",
            r.rank, r.score, r.chunk.id, r.chunk.start, r.chunk.end
        );
        println!("    {}", preview(&r.chunk.text));
    }
    Ok(())
}

/// Single-line preview of a chunk.
fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_cuts() {
        assert_eq!(preview("a\n\n  b\tc"), "a b c");
        let long = "x".repeat(500);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }
}
