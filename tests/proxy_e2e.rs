// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end comparisons through the real HTTP client against a mock proxy.

use rv_client::{ClientConfig, ProxyClient};
use rv_config::{ResolvedConfig, parse_json};
use rv_dialect::ApiStyle;
use rv_error::ErrorCode;
use rv_verdict::{
    DifferenceKind, DifferentialEngine, SuitePlan, SuiteReport, SuiteRunner, ThresholdKey, Verdict,
};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── helpers ──────────────────────────────────────────────────────────

const CONFIG: &str = r#"{
    "model_token": "secret",
    "providers_v2": [
        {"uuid": "p-oa", "name": "openai", "api_base": "https://api.openai.com/v1",
         "api_style": "openai", "token": "sk-1"},
        {"uuid": "p-an", "name": "anthropic", "api_base": "https://api.anthropic.com",
         "api_style": "anthropic", "token": "sk-2"},
        {"uuid": "p-go", "name": "gemini", "api_base": "https://generativelanguage.googleapis.com",
         "api_style": "google", "token": "g-3"}
    ],
    "rules": [
        {"uuid": "r-oa", "scenario": "openai", "request_model": "tingly-gpt",
         "services": [{"provider": "p-oa", "model": "gpt-4o"}]},
        {"uuid": "r-an", "scenario": "anthropic", "request_model": "tingly-claude",
         "services": [{"provider": "p-an", "model": "claude-sonnet"}]},
        {"uuid": "r-go", "scenario": "gemini", "request_model": "tingly-gemini",
         "services": [{"provider": "p-go", "model": "gemini-pro"}]}
    ]
}"#;

const ANSWER: &str = "Hello! This is a brief test response.";

fn config() -> Arc<ResolvedConfig> {
    Arc::new(parse_json(CONFIG).unwrap())
}

fn engine(server: &MockServer) -> DifferentialEngine<ProxyClient> {
    let client = ProxyClient::new(ClientConfig::new(server.uri(), "tingly-box-secret")).unwrap();
    DifferentialEngine::new(Arc::new(client), config())
}

fn openai_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1", "object": "chat.completion", "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content},
                     "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 9, "total_tokens": 21}
    })
}

fn anthropic_body(content: &str) -> Value {
    json!({
        "id": "msg_1", "type": "message", "role": "assistant", "model": "claude-sonnet",
        "content": [{"type": "text", "text": content}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 9}
    })
}

async fn mount_answer(server: &MockServer, scenario: &str, content: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/tingly/{scenario}/chat/completions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(content)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/tingly/{scenario}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(content)))
        .mount(server)
        .await;
}

// ── 1. three-path ────────────────────────────────────────────────────

#[tokio::test]
async fn three_path_sends_direct_transformed_and_roundtrip_requests() {
    let server = MockServer::start().await;
    mount_answer(&server, "openai", ANSWER).await;

    let r = engine(&server).three_path("three_path", Some("openai")).await;
    assert_eq!(r.verdict, Verdict::Pass, "{}", r.message);
    assert_eq!(r.similarity_score, Some(1.0));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let chat = requests
        .iter()
        .filter(|r| r.url.path().ends_with("/chat/completions"))
        .count();
    assert_eq!(chat, 2);
    let via: Vec<_> = requests
        .iter()
        .filter_map(|r| r.headers.get("x-roundtrip-via"))
        .collect();
    assert_eq!(via.len(), 1);
    assert_eq!(via[0].to_str().unwrap(), "anthropic");

    for req in &requests {
        let body: Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["model"], "tingly-gpt");
        assert_eq!(body["max_tokens"], 100);
    }
}

#[tokio::test]
async fn roundtrip_carries_bearer_and_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tingly/anthropic/messages"))
        .and(header("authorization", "Bearer tingly-box-secret"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(ANSWER)))
        .expect(2)
        .mount(&server)
        .await;

    let r = engine(&server)
        .roundtrip(
            "anthropic_roundtrip",
            ApiStyle::Anthropic,
            ApiStyle::OpenAi,
            Some("anthropic"),
            ThresholdKey::Roundtrip,
        )
        .await;
    assert_eq!(r.verdict, Verdict::Pass, "{}", r.message);
    assert_eq!(r.baseline.as_ref().unwrap().model, "tingly-claude");
}

// ── 2. failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn upstream_error_fails_with_transport_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tingly/openai/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(ANSWER)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tingly/openai/messages"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let r = engine(&server)
        .two_path("openai_vs_anthropic", Some("openai"), ApiStyle::OpenAi, ApiStyle::Anthropic)
        .await;
    assert_eq!(r.verdict, Verdict::Fail);
    assert_eq!(r.similarity_score, None);
    let err = r.error.as_ref().unwrap();
    assert_eq!(err.code, ErrorCode::TransportStatus);
    assert!(r.differences_of(DifferenceKind::PathFailure).count() >= 1);
}

#[tokio::test]
async fn unreachable_proxy_fails_every_routed_test() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = ProxyClient::new(ClientConfig::new(uri, "t")).unwrap();
    let engine = DifferentialEngine::new(Arc::new(client), config());
    let r = engine.three_path("three_path", Some("openai")).await;
    assert_eq!(r.verdict, Verdict::Fail);
    assert!(r.message.starts_with("path(s) failed"), "{}", r.message);
}

// ── 3. multi-provider ────────────────────────────────────────────────

#[tokio::test]
async fn diverging_provider_is_flagged_as_minority() {
    let server = MockServer::start().await;
    mount_answer(&server, "openai", ANSWER).await;
    mount_answer(&server, "anthropic", ANSWER).await;
    mount_answer(&server, "gemini", "4815162342 1089 31337 2718281828").await;

    let r = engine(&server).multi_provider("consistency", &[]).await;
    assert_eq!(r.verdict, Verdict::Fail, "{}", r.message);
    assert_eq!(r.pair_scores.len(), 3);
    let minority: Vec<_> = r.differences_of(DifferenceKind::MinorityPair).collect();
    assert_eq!(minority.len(), 1);
    let detail = &minority[0].detail;
    let involved = [detail["left"].as_str().unwrap(), detail["right"].as_str().unwrap()];
    assert!(involved.contains(&"gemini/tingly-gemini"), "{detail}");

    let gemini_calls = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/tingly/gemini/chat/completions")
        .count();
    assert_eq!(gemini_calls, 1);
}

// ── 4. full suites ───────────────────────────────────────────────────

#[tokio::test]
async fn default_suites_pass_against_agreeing_proxy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/chat/completions$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(ANSWER)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/messages$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(ANSWER)))
        .mount(&server)
        .await;

    let runner = SuiteRunner::new(Arc::new(engine(&server)));
    let suites = runner.run_all(&SuitePlan::defaults(Some("openai"))).await;
    let report = SuiteReport::new(server.uri(), suites);

    assert_eq!(report.totals.total, 7);
    assert_eq!(report.totals.passed, 7, "{:#?}", report.results().collect::<Vec<_>>());
    assert!(!report.has_failures());
    assert!((report.success_rate - 100.0).abs() < f64::EPSILON);
}
