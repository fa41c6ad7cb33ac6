use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn holo_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("holo");
    path
}

/// A small repository with one documented, tested module and a mapping
/// file. Embeddings are disabled, so search is curated-only.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let livechat = root.join("modules/communication/livechat");
    fs::create_dir_all(livechat.join("src")).unwrap();
    fs::create_dir_all(livechat.join("tests")).unwrap();
    fs::write(livechat.join("README.md"), "# LiveChat\n\nYouTube live chat handling.\n").unwrap();
    fs::write(livechat.join("INTERFACE.md"), "# Interface\n\n`LiveChatCore.poll()`\n").unwrap();
    fs::write(
        livechat.join("src/livechat_core.py"),
        "class LiveChatCore:\n    \"\"\"Polls and moderates YouTube live chat.\"\"\"\n\n    def poll(self):\n        return []\n",
    )
    .unwrap();
    fs::write(livechat.join("tests/test_core.py"), "def test_poll():\n    pass\n").unwrap();

    fs::write(
        root.join("holo_mappings.toml"),
        r#"version = 1

[[mapping]]
query = "YouTube chat moderation"
target = "modules/communication/livechat/src/livechat_core.py"

[[mapping]]
query = "banter engine responses"
target = "modules/gamification/banter/src/banter_engine.py"
"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[project]
root = "{root}"

[db]
path = "{root}/data/holo.sqlite"

[mappings]
path = "{root}/holo_mappings.toml"

[embedding]
provider = "disabled"
"#,
        root = root.display()
    );
    let config_path = root.join("holo.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// Returns (stdout, stderr, exit code).
fn run_holo(config_path: &Path, args: &[&str]) -> (String, String, i32) {
    let binary = holo_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run holo binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

#[test]
fn test_init_creates_database_and_keeps_mappings() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, code) = run_holo(&config_path, &["init"]);
    assert_eq!(code, 0, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(stdout.contains("Mapping file present"));
    assert!(tmp.path().join("data/holo.sqlite").exists());

    let (_, _, code) = run_holo(&config_path, &["init"]);
    assert_eq!(code, 0, "second init failed (not idempotent)");
}

#[test]
fn test_init_writes_mapping_template() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("holo_mappings.toml")).unwrap();

    let (stdout, _, code) = run_holo(&config_path, &["init"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Created mapping file"));

    let template = fs::read_to_string(tmp.path().join("holo_mappings.toml")).unwrap();
    assert!(template.contains("version = 1"));

    // The template parses to an empty table.
    let (stdout, _, code) = run_holo(&config_path, &["mappings", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("0 curated mapping(s)"));
}

#[test]
fn test_search_curated_only_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, code) = run_holo(&config_path, &["search", "youtube   chat MODERATION"]);
    assert_eq!(code, 0, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. [1.00] curated_mapping"));
    assert!(stdout.contains("modules/communication/livechat/src/livechat_core.py"));
    assert!(stdout.contains("mapping: \"YouTube chat moderation\""));
    assert!(stdout.contains("Notes:"));
    assert!(stdout.contains("semantic search disabled"));
}

#[test]
fn test_search_json_report() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(
        &config_path,
        &["search", "YouTube chat moderation", "--json"],
    );
    assert_eq!(code, 0);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["outcome"], "results");
    assert_eq!(report["limit"], 5);
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["match_origin"], "curated_mapping");
    assert_eq!(results[0]["relevance_score"], 1.0);
    assert!(results[0].get("stale_reference").is_none());
    assert!(results[0]["snippet"]
        .as_str()
        .unwrap()
        .starts_with("class LiveChatCore:"));
    assert_eq!(report["degraded"][0]["service"], "semantic_disabled");
}

#[test]
fn test_search_is_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    let (first, _, _) = run_holo(&config_path, &["search", "chat moderation"]);
    let (second, _, _) = run_holo(&config_path, &["search", "chat moderation"]);
    assert_eq!(first, second);
}

#[test]
fn test_search_no_known_answer_is_success() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(&config_path, &["search", "quantum flux capacitor"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No known answer"));
}

#[test]
fn test_search_flags_stale_reference() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(&config_path, &["search", "banter engine responses"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("modules/gamification/banter/src/banter_engine.py"));
    assert!(stdout.contains("stale reference"));
}

#[test]
fn test_search_advisory_for_existing_module() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(
        &config_path,
        &["search", "add reconnect to communication/livechat"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("[ADVISORY]"));
    assert!(stdout.contains("modules/communication/livechat  (README: yes, tests: yes)"));
    assert!(stdout.contains("modules/communication/livechat/README.md"));
}

#[test]
fn test_search_empty_query_is_invalid_input() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, code) = run_holo(&config_path, &["search", "   "]);
    assert_eq!(code, 2);
    assert!(stderr.contains("invalid input"));
}

#[test]
fn test_search_zero_limit_is_invalid_input() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, code) = run_holo(&config_path, &["search", "chat", "--limit", "0"]);
    assert_eq!(code, 2);
}

#[test]
fn test_search_infrastructure_failure() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("holo_mappings.toml")).unwrap();

    let (stdout, stderr, code) = run_holo(&config_path, &["search", "YouTube chat moderation"]);
    assert_eq!(code, 3, "stdout={}, stderr={}", stdout, stderr);
    assert!(stderr.contains("curated mappings"));
    assert!(stderr.contains("semantic index"));
    assert!(stdout.is_empty());
}

#[test]
fn test_search_exits_promptly_when_embedding_service_hangs() {
    let (_tmp, config_path) = setup_test_env();

    // Accepts connections and never answers.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });

    let config = fs::read_to_string(&config_path).unwrap().replace(
        "provider = \"disabled\"",
        &format!(
            "provider = \"ollama\"\nmodel = \"test-embed\"\ndims = 8\nendpoint = \"http://127.0.0.1:{}\"\n\n[search]\ntimeout_ms = 300",
            port
        ),
    );
    fs::write(&config_path, config).unwrap();
    run_holo(&config_path, &["init"]);

    let started = Instant::now();
    let (stdout, stderr, code) = run_holo(&config_path, &["search", "YouTube chat moderation"]);
    assert_eq!(code, 0, "stdout={}, stderr={}", stdout, stderr);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(stdout.contains("1. [1.00] curated_mapping"));
    assert!(stdout.contains("curated-mapping-only results shown"));
}

#[test]
fn test_check_module_exists() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(
        &config_path,
        &["check-module", "modules.communication.livechat", "--json"],
    );
    assert_eq!(code, 0);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["exists"], true);
    assert_eq!(record["has_readme"], true);
    assert_eq!(record["has_tests"], true);
    assert_eq!(record["resolved_path"], "modules/communication/livechat");
}

#[test]
fn test_check_module_missing_is_success() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(&config_path, &["check-module", "communication/telegram"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("module not found"));
}

#[test]
fn test_check_module_rejects_traversal() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, code) = run_holo(&config_path, &["check-module", "modules/../../etc"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("traversal"));
}

#[test]
fn test_check_module_without_config_file() {
    let (tmp, _config_path) = setup_test_env();

    let output = Command::new(holo_binary())
        .current_dir(tmp.path())
        .args(["--config", "missing.toml", "check-module", "communication/livechat"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("module exists"));
}

#[test]
fn test_mappings_validate_reports_stale() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, code) = run_holo(&config_path, &["mappings", "validate"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("total: 2"));
    assert!(stdout.contains("stale: 1"));
    assert!(stdout.contains("banter engine responses"));
}

#[test]
fn test_index_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env();

    run_holo(&config_path, &["init"]);
    let (_, stderr, code) = run_holo(&config_path, &["index"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_stats_after_init() {
    let (_tmp, config_path) = setup_test_env();

    run_holo(&config_path, &["init"]);
    let (stdout, stderr, code) = run_holo(&config_path, &["stats"]);
    assert_eq!(code, 0, "stats failed: {}", stderr);
    assert!(stdout.contains("Artifacts:   0"));
    assert!(stdout.contains("Entries:     2"));
    assert!(stdout.contains("Stale:       1"));
}

#[test]
fn test_invalid_config_exits_1() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        format!(
            "[project]\nroot = \"{}\"\n[search]\ndefault_limit = 0\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, _, code) = run_holo(&config_path, &["search", "chat"]);
    assert_eq!(code, 1);
}
