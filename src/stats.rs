//! Corpus statistics.
//!
//! Loads and chunks the corpus exactly as `search` and `ask` would, then
//! prints document and chunk counts with a per-format breakdown. A quick
//! way to confirm globs and chunking settings before an evaluation run.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::pipeline;

/// Per-format breakdown of document and chunk counts.
#[derive(Debug, Default, PartialEq)]
struct FormatStats {
    doc_count: usize,
    chunk_count: usize,
    bytes: u64,
}

/// Run the stats command: load the corpus and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let (docs, chunks) = pipeline::load_chunks(config)?;

    let total_bytes: u64 = docs.iter().map(|d| d.text.len() as u64).sum();

    let mut by_format: BTreeMap<String, FormatStats> = BTreeMap::new();
    for d in &docs {
        let entry = by_format.entry(d.source.format.clone()).or_default();
        entry.doc_count += 1;
        entry.bytes += d.text.len() as u64;
    }
    let format_of: BTreeMap<&str, &str> = docs
        .iter()
        .map(|d| (d.id.as_str(), d.source.format.as_str()))
        .collect();
    for c in &chunks {
        if let Some(format) = format_of.get(c.document_id.as_str()) {
            by_format.entry(format.to_string()).or_default().chunk_count += 1;
        }
    }

    println!("ragbench corpus stats");
    println!("=====================");
    println!();
    println!("  Root:        {}", config.corpus.root.display());
    println!("  Size:        {}", format_bytes(total_bytes));
    println!(
        "  Chunking:    size {} / overlap {}",
        config.chunking.chunk_size, config.chunking.overlap_ratio
    );
    println!("  Backend:     {}", config.index.backend);
    println!();
    println!("  Documents:   {}", docs.len());
    println!("  Chunks:      {}", chunks.len());

    if !by_format.is_empty() {
        println!();
        println!("  By format:");
        println!("  {:<16} {:>6} {:>8} {:>10}", "FORMAT", "DOCS", "CHUNKS", "SIZE");
        println!("  {}", "-".repeat(44));
        for (format, s) in &by_format {
            println!(
                "  {:<16} {:>6} {:>8} {:>10}",
                format,
                s.doc_count,
                s.chunk_count,
                format_bytes(s.bytes)
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
