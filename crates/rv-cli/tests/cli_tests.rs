// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for the `rv` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::io::Write;
use std::path::Path;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rv() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("rv").expect("binary `rv` should be built");
    for var in [
        "RV_CONFIG",
        "RV_SERVER_URL",
        "RV_AUTH_TOKEN",
        "RV_TIMEOUT_SECS",
        "RV_LOG_LEVEL",
        "RV_TEST_PROMPT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

fn config_json(server_url: &str) -> String {
    json!({
        "server_url": server_url,
        "model_token": "secret",
        "providers_v2": [
            {"uuid": "p-oa", "name": "openai", "api_base": "https://api.openai.com/v1",
             "api_style": "openai", "token": "sk-1"},
            {"uuid": "p-an", "name": "anthropic", "api_base": "https://api.anthropic.com",
             "api_style": "anthropic", "token": "sk-2"}
        ],
        "rules": [
            {"uuid": "r-oa", "scenario": "openai", "request_model": "tingly-gpt",
             "services": [{"provider": "p-oa", "model": "gpt-4o"}]},
            {"uuid": "r-an", "scenario": "anthropic", "request_model": "tingly-claude",
             "services": [{"provider": "p-an", "model": "claude-sonnet"}]}
        ]
    })
    .to_string()
}

const ANTHROPIC_BODY: &str = r#"{
    "id": "msg_1", "type": "message", "role": "assistant", "model": "claude-sonnet",
    "content": [{"type": "text", "text": "Hello there."}],
    "stop_reason": "end_turn",
    "usage": {"input_tokens": 10, "output_tokens": 3}
}"#;

// ── 1. Help and version ─────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    rv().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("differential verification"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check-config"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("models"));
}

#[test]
fn version_shows_version_string() {
    rv().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_subcommand_is_usage_error() {
    rv().assert().failure().stderr(predicate::str::contains("Usage"));
}

// ── 2. check-config ─────────────────────────────────────────────────

#[test]
fn check_config_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(dir.path(), "config.json", &config_json("http://localhost:12580"));
    rv().args(["check-config", "--config"])
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::contains("providers: 2"))
        .stdout(predicate::str::contains("rules: 2"))
        .stdout(predicate::str::contains("anthropic, openai").or(predicate::str::contains("openai, anthropic")))
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn check_config_rejects_bad_server_url() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(dir.path(), "config.json", &config_json("localhost:12580"));
    rv().args(["check-config", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("must start with http://"));
}

#[test]
fn check_config_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    rv().args(["check-config", "--config"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.json"));
}

// ── 3. validate ─────────────────────────────────────────────────────

#[test]
fn validate_accepts_well_formed_body() {
    let dir = tempfile::tempdir().unwrap();
    let body = write_file(dir.path(), "body.json", ANTHROPIC_BODY);
    rv().arg("validate")
        .arg(&body)
        .assert()
        .success()
        .stdout(predicate::str::contains("well-formed"))
        .stderr(predicate::str::contains("style: anthropic (detected from body shape"));
}

#[test]
fn validate_with_explicit_style_reports_no_detection() {
    let dir = tempfile::tempdir().unwrap();
    let body = write_file(dir.path(), "body.json", ANTHROPIC_BODY);
    rv().args(["validate", "--style", "anthropic"])
        .arg(&body)
        .assert()
        .success()
        .stderr(predicate::str::contains("detected from body shape").not());
}

#[test]
fn validate_flags_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let body = write_file(dir.path(), "body.json", r#"{"choices": []}"#);
    rv().args(["validate", "--style", "openai"])
        .arg(&body)
        .assert()
        .failure()
        .stdout(predicate::str::contains("error(s)"));
}

#[test]
fn validate_json_output_lists_issues() {
    let dir = tempfile::tempdir().unwrap();
    let body = write_file(dir.path(), "body.json", r#"{"choices": []}"#);
    let out = rv()
        .args(["validate", "--style", "openai", "--format", "json"])
        .arg(&body)
        .output()
        .unwrap();
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(!v["issues"].as_array().unwrap().is_empty());
}

#[test]
fn validate_undetectable_body_asks_for_style() {
    let dir = tempfile::tempdir().unwrap();
    let body = write_file(dir.path(), "body.json", r#"{"hello": "world"}"#);
    rv().arg("validate")
        .arg(&body)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --style"));
}

#[test]
fn validate_unknown_style_fails() {
    let dir = tempfile::tempdir().unwrap();
    let body = write_file(dir.path(), "body.json", ANTHROPIC_BODY);
    rv().args(["validate", "--style", "cohere"])
        .arg(&body)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown API style"));
}

// ── 4. run ──────────────────────────────────────────────────────────

#[test]
fn run_rejects_unknown_suite() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(dir.path(), "config.json", &config_json("http://localhost:12580"));
    rv().args(["run", "--suite", "nightly", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown suite 'nightly'"));
}

#[test]
fn run_rejects_unknown_format() {
    rv().args(["run", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown output format"));
}

async fn mock_proxy() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/chat/completions$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1", "object": "chat.completion", "created": 1_700_000_000,
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello there."},
                         "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/messages$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::from_str::<Value>(ANTHROPIC_BODY).unwrap()),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn run_against_agreeing_proxy_passes_and_writes_report() {
    let server = mock_proxy().await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(dir.path(), "config.json", &config_json(&server.uri()));
    let out_path = dir.path().join("reports").join("run.json");

    let cfg_arg = cfg.clone();
    let out_arg = out_path.clone();
    let output = tokio::task::spawn_blocking(move || {
        rv().args(["run", "--scenario", "openai", "--format", "json", "--config"])
            .arg(&cfg_arg)
            .arg("--out")
            .arg(&out_arg)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stdout["totals"]["total"], 7);
    assert_eq!(stdout["totals"]["passed"], 7);
    assert_eq!(stdout["suites"][0]["suite_name"], "differential");
    assert_eq!(stdout["suites"][1]["suite_name"], "compliance");

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(saved["run_id"], stdout["run_id"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("[rv] 7 tests: 7 pass"));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_exits_nonzero_when_a_test_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(dir.path(), "config.json", &config_json(&server.uri()));

    let output = tokio::task::spawn_blocking(move || {
        rv().args(["run", "--suite", "compliance", "--scenario", "openai", "--config"])
            .arg(&cfg)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[FAIL] openai_format_compliance"), "{stdout}");
    assert!(stdout.contains("2 failed"), "{stdout}");
}

// ── 5. models ───────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn models_prints_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/models$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "tingly-gpt"}, {"id": "tingly-claude"}]
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(dir.path(), "config.json", &config_json(&server.uri()));

    let output = tokio::task::spawn_blocking(move || {
        rv().args(["models", "--scenario", "openai", "--config"])
            .arg(&cfg)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["tingly-gpt", "tingly-claude"]);
}
