//! Tests for the `docqa` binary.
//!
//! Uses the hashing embedder so no model download is needed; commands that
//! require the language model are only exercised on their failure path.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("docqa.toml");
    fs::write(
        &config_path,
        r#"
[chunking]
chunk_size = 12
chunk_overlap = 0

[embedding]
provider = "hashing"
dims = 1024

[generation]
model_path = "/nonexistent/model.gguf"
"#,
    )
    .unwrap();
    let doc = tmp.path().join("animals.txt");
    fs::write(&doc, "A cat sat.\nA dog ran.\nA bird flew.\n").unwrap();
    (tmp, config_path, doc)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_docqa"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "docqa=warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa: {}", e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn chunks_lists_the_split() {
    let (_tmp, config, doc) = setup();
    let (stdout, stderr, ok) = run_docqa(&config, &["chunks", doc.to_str().unwrap()]);
    assert!(ok, "chunks failed: {}", stderr);
    assert!(stdout.contains("--- Chunks (3) ---"), "got: {}", stdout);
    assert!(stdout.contains("[chunk 0]\nA cat sat."));
}

#[test]
fn chunks_json_is_parseable() {
    let (_tmp, config, doc) = setup();
    let (stdout, _, ok) = run_docqa(&config, &["chunks", doc.to_str().unwrap(), "--json"]);
    assert!(ok);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let chunks = value.as_array().unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2]["text"], "A bird flew.");
    assert_eq!(chunks[2]["index"], 2);
}

#[test]
fn chunks_never_builds_an_embedder() {
    let (tmp, _, doc) = setup();
    let config = tmp.path().join("local.toml");
    fs::write(
        &config,
        r#"
[chunking]
chunk_size = 12
chunk_overlap = 0

[embedding]
provider = "local"
model = "no-such-embedding-model"
cache_dir = "/nonexistent/cache"
"#,
    )
    .unwrap();
    let (stdout, stderr, ok) = run_docqa(&config, &["chunks", doc.to_str().unwrap()]);
    assert!(ok, "chunks failed: {}", stderr);
    assert!(stdout.contains("--- Chunks (3) ---"), "got: {}", stdout);
}

#[test]
fn search_prints_nearest_first() {
    let (_tmp, config, doc) = setup();
    let (stdout, stderr, ok) = run_docqa(
        &config,
        &["search", doc.to_str().unwrap(), "Which animal sat?", "--k", "2"],
    );
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["), "got: {}", stdout);
    assert!(stdout.contains("excerpt: \"A cat sat.\""));
    assert!(!stdout.contains("3. ["));
}

#[test]
fn search_json_honours_top_k_override() {
    let (_tmp, config, doc) = setup();
    let (stdout, _, ok) = run_docqa(
        &config,
        &["--top-k", "1", "search", doc.to_str().unwrap(), "dog", "--json"],
    );
    assert!(ok);
    let hits: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["text"], "A dog ran.");
}

#[test]
fn missing_document_exits_nonzero() {
    let (tmp, config, _) = setup();
    let missing = tmp.path().join("absent.pdf");
    let (_, stderr, ok) = run_docqa(&config, &["search", missing.to_str().unwrap(), "q"]);
    assert!(!ok);
    assert!(stderr.contains("document not found"), "got: {}", stderr);
}

#[test]
fn ask_without_model_exits_nonzero() {
    let (_tmp, config, doc) = setup();
    let (stdout, stderr, ok) = run_docqa(&config, &["ask", doc.to_str().unwrap(), "Who sat?"]);
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("error:"), "got: {}", stderr);
}

#[test]
fn invalid_override_is_rejected() {
    let (_tmp, config, doc) = setup();
    let (_, stderr, ok) = run_docqa(
        &config,
        &["--chunk-overlap", "20", "chunks", doc.to_str().unwrap()],
    );
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"), "got: {}", stderr);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_docqa(
        &tmp.path().join("nope.toml"),
        &["chunks", "whatever.txt"],
    );
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"), "got: {}", stderr);
}
