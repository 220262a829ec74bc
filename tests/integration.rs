use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pilot_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pilot");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let issues_dir = root.join("issues");
    fs::create_dir_all(&issues_dir).unwrap();
    fs::write(
        issues_dir.join("issue_4217.json"),
        r#"{
  "number": 4217,
  "title": "Replica stuck in recovery after restart",
  "body": "After restarting a node the replica enters recovery and never becomes active. The logs show repeated PeerSync failures.",
  "comments": [
    {
      "id": 9001,
      "author": "solr-dev",
      "body": "Check whether the transaction log directory is writable and not corrupted."
    }
  ]
}"#,
    )
    .unwrap();
    fs::write(
        issues_dir.join("issue_4300.json"),
        r#"{
  "number": 4300,
  "title": "ZooKeeper session expiry drops collection state",
  "body": "When the ZooKeeper session expires the collection state is briefly lost and queries fail with 503.",
  "comments": []
}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
persist_dir = "{}/vector_store"
collection = "issue_support"

[chunking]
chunk_size = 300
overlap = 60

[retrieval]
top_k = 5

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
"#,
        root.display()
    );

    let config_path = config_dir.join("pilot.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pilot(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pilot_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pilot binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_chunk_writes_record_files() {
    let (tmp, config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    let (stdout, stderr, success) = run_pilot(
        &config_path,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents:      2"));
    assert!(stdout.contains("chunks written: 3"));

    assert!(chunks.join("issue_4217_body_0.json").exists());
    assert!(chunks.join("issue_4217_comment_9001_0.json").exists());
    assert!(chunks.join("issue_4300_body_0.json").exists());
}

#[test]
fn test_chunk_record_contents() {
    let (tmp, config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    run_pilot(
        &config_path,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );

    let record: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(chunks.join("issue_4217_comment_9001_0.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["chunk_id"], "issue_4217_comment_9001_0");
    assert_eq!(record["issue_number"], 4217);
    assert_eq!(record["source"], "comment");
    assert_eq!(record["comment_id"], "9001");
    assert!(record["text"]
        .as_str()
        .unwrap()
        .contains("transaction log directory"));
}

#[test]
fn test_chunk_rerun_is_deterministic() {
    let (tmp, config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    run_pilot(
        &config_path,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    let first = fs::read_to_string(chunks.join("issue_4217_body_0.json")).unwrap();

    run_pilot(
        &config_path,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    let second = fs::read_to_string(chunks.join("issue_4217_body_0.json")).unwrap();
    assert_eq!(first, second);

    let count = fs::read_dir(&chunks).unwrap().count();
    assert_eq!(count, 3);
}

#[test]
fn test_chunk_skips_malformed_document() {
    let (tmp, config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    fs::write(issues.join("broken.json"), "{this is not json").unwrap();

    let (stdout, stderr, success) = run_pilot(
        &config_path,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents:      2"));
    assert!(stdout.contains("skipped:        1"));
}

#[test]
fn test_chunk_rejects_invalid_overlap() {
    let (tmp, config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    let (_, stderr, success) = run_pilot(
        &config_path,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
            "--chunk-size",
            "50",
            "--overlap",
            "50",
        ],
    );
    assert!(!success, "chunk should fail when overlap >= chunk_size");
    assert!(stderr.contains("overlap"));
}

#[test]
fn test_chunk_works_without_config_file() {
    let (tmp, _config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");
    let missing_config = tmp.path().join("nope.toml");

    let (stdout, stderr, success) = run_pilot(
        &missing_config,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(chunks.join("issue_4217_body_0.json").exists());
}

#[test]
fn test_chunk_rejects_invalid_config_file() {
    let (tmp, _config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    let bad_config = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad_config,
        r#"[store]
persist_dir = "./vector_store"

[chunking]
chunk_size = 300
overlap = 500

[embedding]
model = "text-embedding-3-small"
dims = 1536
"#,
    )
    .unwrap();

    let (_, stderr, success) = run_pilot(
        &bad_config,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    assert!(!success, "chunk should fail when the config is invalid");
    assert!(stderr.contains("overlap"));
    assert!(!chunks.exists());
}

#[test]
fn test_chunk_rejects_unparseable_config_file() {
    let (tmp, _config_path) = setup_test_env();
    let issues = tmp.path().join("issues");
    let chunks = tmp.path().join("chunks");

    let bad_config = tmp.path().join("config").join("garbled.toml");
    fs::write(&bad_config, "[store\npersist_dir = ???").unwrap();

    let (_, stderr, success) = run_pilot(
        &bad_config,
        &[
            "chunk",
            "--input-dir",
            issues.to_str().unwrap(),
            "--output-dir",
            chunks.to_str().unwrap(),
        ],
    );
    assert!(!success, "chunk should fail when the config cannot be parsed");
    assert!(stderr.contains("parse"));
}

#[test]
fn test_tool_list_needs_no_config() {
    let (tmp, _config_path) = setup_test_env();
    let missing_config = tmp.path().join("nope.toml");

    let (stdout, stderr, success) = run_pilot(&missing_config, &["tool", "list"]);
    assert!(success, "tool list failed: stderr={}", stderr);
    assert!(stdout.contains("doc_retriever"));
    assert!(stdout.contains("log_searcher"));
    assert!(stdout.contains("config_validator"));
    assert!(stdout.contains("summarizer"));
}

#[test]
fn test_index_rejects_bad_config() {
    let (tmp, _config_path) = setup_test_env();
    let bad_config = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad_config,
        r#"[store]
persist_dir = "./vector_store"

[embedding]
provider = "cohere"
model = "embed-english"
dims = 1024
"#,
    )
    .unwrap();

    let (_, stderr, success) = run_pilot(&bad_config, &["index", "--data-dir", "./chunks"]);
    assert!(!success, "index should fail for an unknown provider");
    assert!(stderr.contains("provider"));
}

#[test]
fn test_ask_fails_without_api_key() {
    let (tmp, config_path) = setup_test_env();
    let binary = pilot_binary();

    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["ask", "why is my replica stuck?"])
        .env_remove("OPENAI_API_KEY")
        .current_dir(tmp.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"));
}
