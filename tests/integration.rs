use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rbench_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rbench"))
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("notes")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes/gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(files_dir.join("ignored.json"), "{\"rust\": true}").unwrap();

    let config_content = format!(
        r#"[corpus]
root = "{}/files"
include_globs = ["**/*.md", "**/*.txt"]

[chunking]
chunk_size = 60
overlap_ratio = 0.25

[index]
backend = "lexical"
top_k = 3
{}
"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("rbench.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rbench(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rbench_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rbench binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_stats_counts_documents() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, ok) = run_rbench(&config, &["stats"]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Documents:   3"), "{}", stdout);
    assert!(stdout.contains("markdown"));
    assert!(stdout.contains("text"));
}

#[test]
fn test_search_lexical_finds_rust_doc() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, ok) = run_rbench(&config, &["search", "cargo crates"]);
    assert!(ok, "search failed: {}", stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. "), "{}", stdout);
    assert!(first.contains("alpha.md#"), "{}", stdout);
}

#[test]
fn test_search_sparse_backend_override() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, ok) =
        run_rbench(&config, &["search", "kubernetes docker", "--backend", "sparse"]);
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("notes/gamma.txt#"), "{}", stdout);
}

#[test]
fn test_search_dense_with_hash_embeddings() {
    let (_tmp, config) = setup_test_env(
        "\n[embedding]\nprovider = \"hash\"\ndims = 128\n",
    );
    let (stdout, stderr, ok) = run_rbench(
        &config,
        &["search", "python machine learning pytorch", "--backend", "dense", "--limit", "1"],
    );
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("beta.md#"), "{}", stdout);
    assert!(!stdout.contains("2. "));
}

#[test]
fn test_search_no_match() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _stderr, ok) = run_rbench(&config, &["search", "zebra giraffe"]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_dense_without_embeddings_fails() {
    let (_tmp, config) = setup_test_env("");
    let (_stdout, stderr, ok) =
        run_rbench(&config, &["search", "rust", "--backend", "dense"]);
    assert!(!ok);
    assert!(stderr.contains("requires embeddings"), "{}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config) = setup_test_env("\n[agent]\nmin_broad = 15\nmin_specific = 10\n");
    let (_stdout, stderr, ok) = run_rbench(&config, &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("agent"), "{}", stderr);
}
