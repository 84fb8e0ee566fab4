//! Integration tests for the HTTP backends against a local stub server

use super::test_utils::StubServer;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use holicast::clock::ManualClock;
use holicast::config::GeneratorSettings;
use holicast::error::GenerationError;
use holicast::policy::DegradationPolicy;
use holicast::provider::{
    FusionBrainBackend, HuggingFaceBackend, ImageBackend, ImageJobClient, OpenAiBackend,
};
use holicast::types::{Dimensions, RateBudget};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn client(backend: Arc<dyn ImageBackend>, clock: &ManualClock) -> ImageJobClient {
    let settings = GeneratorSettings {
        translate_prompt: false,
        soft_prompt: "soft prompt".to_string(),
        max_poll_attempts: 5,
        poll_interval: Duration::from_secs(3),
        rate_budget: RateBudget::new(5, Duration::from_secs(1)),
        seed: Some(0),
        ..GeneratorSettings::default()
    };
    ImageJobClient::new(backend, None, settings, Arc::new(clock.clone()))
}

fn json_body(value: serde_json::Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

#[tokio::test]
async fn test_fusion_brain_submit_then_poll_until_done() {
    let polls = Arc::new(AtomicUsize::new(0));
    let seen_polls = polls.clone();
    let image = BASE64.encode(b"PNGDATA");
    let server = StubServer::start(move |request| {
        if request.path.starts_with("/web/api/v1/text2image/run") {
            return (201, "application/json", json_body(json!({"uuid": "job-1", "status": "INITIAL"})));
        }
        if request.path == "/web/api/v1/text2image/status/job-1" {
            if seen_polls.fetch_add(1, Ordering::SeqCst) == 0 {
                return (200, "application/json", json_body(json!({"uuid": "job-1", "status": "PROCESSING"})));
            }
            return (
                200,
                "application/json",
                json_body(json!({"uuid": "job-1", "status": "DONE", "images": [image], "censored": false})),
            );
        }
        (404, "text/plain", b"not found".to_vec())
    });

    let backend = Arc::new(FusionBrainBackend::new(Some(server.base_url.clone()), TIMEOUT).unwrap());
    let clock = ManualClock::new();
    let outcome = client(backend, &clock)
        .submit("Day of the Cook", Some("ANIME"), Dimensions::new(512, 512))
        .await;

    assert_eq!(outcome.result.unwrap().as_slice(), b"PNGDATA");
    assert_eq!(outcome.requests_made, 1);
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(3); 2]);

    let requests = server.requests();
    let run = &requests[0];
    assert_eq!(run.method, "POST");
    assert_eq!(run.path, "/web/api/v1/text2image/run?model_id=1");
    assert_eq!(run.header("origin"), Some("https://editor.fusionbrain.ai"));
    let body = String::from_utf8_lossy(&run.body);
    assert!(body.contains("name=\"params\""));
    assert!(body.contains("\"query\":\"Day of the Cook\""));
    assert!(body.contains("\"style\":\"ANIME\""));
}

#[tokio::test]
async fn test_fusion_brain_censored_result_triggers_soft_retry() {
    let server = StubServer::start(move |request| {
        let body = String::from_utf8_lossy(&request.body).to_string();
        if request.path.starts_with("/web/api/v1/text2image/run") {
            let uuid = if body.contains("soft prompt") { "soft" } else { "spicy" };
            return (201, "application/json", json_body(json!({ "uuid": uuid })));
        }
        if request.path.ends_with("/spicy") {
            return (
                200,
                "application/json",
                json_body(json!({"status": "DONE", "images": ["AAAA"], "censored": true})),
            );
        }
        (
            200,
            "application/json",
            json_body(json!({"status": "DONE", "images": [BASE64.encode(b"SOFT")], "censored": false})),
        )
    });

    let backend = Arc::new(FusionBrainBackend::new(Some(server.base_url.clone()), TIMEOUT).unwrap());
    let clock = ManualClock::new();
    let policy = DegradationPolicy::new(Arc::new(client(backend, &clock)));
    let outcome = policy.generate_one(0, "Spicy day").await;

    assert_eq!(outcome.result.as_slice(), b"SOFT");
    assert_eq!(outcome.requests_made, 2);
    let runs = server
        .requests()
        .iter()
        .filter(|r| r.path.contains("/run"))
        .count();
    assert_eq!(runs, 2);
    assert!(clock.sleeps().contains(&Duration::from_secs(13)));
}

#[tokio::test]
async fn test_openai_bad_request_is_rejection_and_urls_are_downloaded() {
    let server = StubServer::start(move |request| {
        if request.path == "/v1/images/generations" {
            return (400, "application/json", json_body(json!({"error": {"message": "safety system"}})));
        }
        if request.path == "/files/image.png" {
            return (200, "image/png", b"DALLE".to_vec());
        }
        (404, "text/plain", Vec::new())
    });
    let image_url = format!("{}/files/image.png", server.base_url);
    let backend = Arc::new(
        OpenAiBackend::new("sk-test".into(), Some(format!("{}/v1", server.base_url)), TIMEOUT).unwrap(),
    );
    let clock = ManualClock::new();
    let client = client(backend.clone(), &clock);

    let rejected = client.submit("Spicy day", None, Dimensions::default()).await;
    assert!(matches!(rejected.result, Err(GenerationError::Rejected(_))));

    let bytes = backend
        .fetch(holicast::types::ImagePayload::Url(image_url))
        .await
        .unwrap();
    assert_eq!(bytes.as_slice(), b"DALLE");

    let generation = &server.requests()[0];
    assert_eq!(generation.header("authorization"), Some("Bearer sk-test"));
    let body: serde_json::Value = serde_json::from_slice(&generation.body).unwrap();
    assert_eq!(body["size"], "512x512");
    assert_eq!(body["n"], 1);
}

#[tokio::test]
async fn test_hugging_face_waits_for_model_loading() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let server = StubServer::start(move |request| {
        if request.path != "/models/nerijs/pixel-art-xl" {
            return (404, "text/plain", Vec::new());
        }
        if seen.fetch_add(1, Ordering::SeqCst) < 2 {
            return (
                503,
                "application/json",
                json_body(json!({"error": "Model is currently loading", "estimated_time": 12.0})),
            );
        }
        (200, "image/jpeg", b"HFIMAGE".to_vec())
    });

    let backend = Arc::new(
        HuggingFaceBackend::new("hf_test".into(), Some(format!("{}/models", server.base_url)), TIMEOUT)
            .unwrap(),
    );
    let clock = ManualClock::new();
    let outcome = client(backend.clone(), &clock)
        .submit("Sloth day", Some("PIXELART"), Dimensions::default())
        .await;

    assert_eq!(outcome.result.unwrap().as_slice(), b"HFIMAGE");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Every inference call is charged and spaced by the request delay.
    assert_eq!(outcome.requests_made, 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(13); 2]);
    assert_eq!(backend.pending_jobs(), 0);
    let requests = server.requests();
    assert_eq!(requests[0].header("authorization"), Some("Bearer hf_test"));
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["inputs"], "Sloth day");
}

#[tokio::test]
async fn test_hugging_face_model_that_never_loads_is_forgotten() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let server = StubServer::start(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        (
            503,
            "application/json",
            json_body(json!({"error": "Model is currently loading", "estimated_time": 600.0})),
        )
    });

    let backend = Arc::new(
        HuggingFaceBackend::new("hf_test".into(), Some(server.base_url.clone()), TIMEOUT).unwrap(),
    );
    let clock = ManualClock::new();
    let outcome = client(backend.clone(), &clock)
        .submit("Sloth day", None, Dimensions::default())
        .await;

    assert_eq!(
        outcome.result.unwrap_err(),
        GenerationError::TimedOut { attempts: 5 }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(outcome.requests_made, 6);
    assert_eq!(backend.pending_jobs(), 0);
}

#[tokio::test]
async fn test_server_error_is_a_transport_failure() {
    let server = StubServer::start(|_| (500, "text/plain", b"upstream exploded".to_vec()));
    let backend = Arc::new(
        HuggingFaceBackend::new("hf_test".into(), Some(server.base_url.clone()), TIMEOUT).unwrap(),
    );
    let clock = ManualClock::new();
    let outcome = client(backend, &clock)
        .submit("Any day", None, Dimensions::default())
        .await;

    match outcome.result {
        Err(GenerationError::Transport(message)) => assert!(message.contains("500")),
        other => panic!("expected transport error, got {:?}", other),
    }
}
