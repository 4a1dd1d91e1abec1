//! HTTP surface tests: webhook markup, audio retrieval, health, and auth.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use http::{header, Request, StatusCode};
use tower::ServiceExt;

use parlance_gateway::config::ServerConfig;
use parlance_gateway::core::artifact::AudioArtifact;
use parlance_gateway::core::completion::{ChatMessage, CompletionBackend};
use parlance_gateway::core::synthesis::{DisabledSynthesizer, SpeechSynthesizer};
use parlance_gateway::errors::app_error::{SynthesisError, UpstreamError};
use parlance_gateway::routes::build_router;
use parlance_gateway::state::AppState;

struct FixedCompletion;

#[async_trait]
impl CompletionBackend for FixedCompletion {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        Ok("We close at five.".to_string())
    }
}

struct OkSynth;

#[async_trait]
impl SpeechSynthesizer for OkSynth {
    async fn synthesize(&self, _text: &str) -> Result<AudioArtifact, SynthesisError> {
        Ok(AudioArtifact::new("audio/mpeg", Bytes::from_static(b"mp3")))
    }
}

fn app(config: ServerConfig, synth: Arc<dyn SpeechSynthesizer>) -> (axum::Router, Arc<AppState>) {
    let state = AppState::with_backends(config, Arc::new(FixedCompletion), synth);
    (build_router(state.clone()), state)
}

fn voice_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/voice")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::HOST, "agent.example.com")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_active_sessions() {
    let (router, _state) = app(ServerConfig::default(), Arc::new(DisabledSynthesizer));
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"status\":\"ok\""));
    assert!(body.contains("active_sessions"));
}

#[tokio::test]
async fn root_metadata_reports_audio_ttl() {
    let mut config = ServerConfig::default();
    config.artifact_ttl_secs = 90;
    let (router, _state) = app(config, Arc::new(DisabledSynthesizer));

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"audio_ttl_seconds\":90"));
    assert!(body.contains("\"media_stream\":\"/stream\""));
}

#[tokio::test]
async fn first_webhook_turn_returns_greeting_markup() {
    let (router, state) = app(ServerConfig::default(), Arc::new(DisabledSynthesizer));

    let response = router
        .oneshot(voice_request("CallSid=CA100&From=%2B61400000000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/xml"));

    let body = body_string(response).await;
    assert!(body.contains("<Gather input=\"speech\""));
    assert!(body.contains(&format!("<Say>{}</Say>", state.config.greeting_line)));
    assert!(!body.contains("<Hangup/>"));
}

#[tokio::test]
async fn synthesized_turn_plays_cached_audio() {
    let (router, state) = app(ServerConfig::default(), Arc::new(OkSynth));

    // Greeting turn creates the session
    let first = router
        .clone()
        .oneshot(voice_request("CallSid=CA200&From=%2B61"))
        .await
        .unwrap();
    let first_body = body_string(first).await;
    assert!(first_body.contains("<Play>https://agent.example.com/audio/"));

    // Extract the artifact URL path and fetch it back
    let start = first_body.find("/audio/").unwrap();
    let path = &first_body[start..start + "/audio/".len() + 36];

    let audio = router
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(audio.status(), StatusCode::OK);
    assert_eq!(
        audio.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/mpeg"
    );
    let payload = axum::body::to_bytes(audio.into_body(), usize::MAX).await.unwrap();
    assert_eq!(payload, Bytes::from_static(b"mp3"));

    assert!(state.sessions.get("CA200").is_some());
}

#[tokio::test]
async fn unknown_audio_artifact_is_404() {
    let (router, _state) = app(ServerConfig::default(), Arc::new(OkSynth));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/audio/00000000-0000-4000-8000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn terminal_turn_renders_hangup() {
    let (router, _state) = app(ServerConfig::default(), Arc::new(DisabledSynthesizer));

    router
        .clone()
        .oneshot(voice_request("CallSid=CA300&From=%2B61"))
        .await
        .unwrap();

    let response = router
        .oneshot(voice_request(
            "CallSid=CA300&From=%2B61&SpeechResult=goodbye&Confidence=0.98",
        ))
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.contains("<Hangup/>"));
    assert!(!body.contains("<Gather"));
}

#[tokio::test]
async fn voice_stream_hands_off_to_media_stream() {
    let mut config = ServerConfig::default();
    config.public_url = Some("https://agent.example.com".to_string());
    let (router, _state) = app(config, Arc::new(DisabledSynthesizer));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/voice-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.contains("<Connect><Stream url=\"wss://agent.example.com/stream\"/></Connect>"));
}

#[tokio::test]
async fn auth_token_gates_call_flow_routes() {
    let mut config = ServerConfig::default();
    config.auth_token = Some("sekrit".to_string());
    let (router, _state) = app(config, Arc::new(DisabledSynthesizer));

    // Missing token is rejected
    let denied = router
        .clone()
        .oneshot(voice_request("CallSid=CA400"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    // Bearer header is accepted
    let mut request = voice_request("CallSid=CA400");
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer sekrit".parse().unwrap(),
    );
    let allowed = router.clone().oneshot(request).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    // Query form is accepted too (stream URLs cannot carry headers)
    let query = Request::builder()
        .method("POST")
        .uri("/voice?token=sekrit")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA401"))
        .unwrap();
    let allowed = router.clone().oneshot(query).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    // Health stays public
    let health = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
