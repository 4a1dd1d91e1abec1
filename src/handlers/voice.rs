//! Telephony voice webhook: one POST per caller turn.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use futures::FutureExt;
use serde::Deserialize;

use crate::core::turn::SpeechInput;
use crate::state::AppState;
use crate::utils::twiml;

/// The subset of the telephony webhook form this service reads. Field names
/// follow the provider's PascalCase convention.
#[derive(Debug, Deserialize, Default)]
pub struct VoiceWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<f32>,
}

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Resolve the externally reachable base URL for audio links: configured
/// `public_url` first, the request `Host` header otherwise.
fn public_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(ref url) = state.config.public_url {
        return url.clone();
    }
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| format!("https://{host}"))
        .unwrap_or_default()
}

/// Discrete webhook turn: run the state machine and answer with telephony
/// markup. This handler never returns an HTTP error: even a panic inside
/// turn processing renders as an apology-and-hangup document, because the
/// telephony provider turns error statuses into a robotic failure message.
pub async fn voice_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<VoiceWebhookForm>,
) -> Response {
    let call_id = form.call_sid.unwrap_or_else(|| "unknown-call".to_string());
    let caller_id = form.from.unwrap_or_default();
    let input = SpeechInput::new(form.speech_result, form.confidence);

    tracing::debug!(
        call_id = %call_id,
        has_speech = input.text.is_some(),
        confidence = input.confidence,
        "voice webhook turn"
    );

    let outcome = AssertUnwindSafe(state.turns.process(&call_id, &caller_id, input))
        .catch_unwind()
        .await;

    match outcome {
        Ok(outcome) => {
            let base = public_base(&state, &headers);
            xml_response(twiml::turn_response(
                &outcome,
                &base,
                &state.config.speech_language,
            ))
        }
        Err(_) => {
            tracing::error!(call_id = %call_id, "turn processing panicked");
            state.sessions.remove(&call_id);
            xml_response(twiml::apology_hangup(
                "Sorry, something went wrong on my end. Please call back in a moment.",
            ))
        }
    }
}

/// Streaming entry point: answer with markup that hands the call off to the
/// bidirectional media stream endpoint.
pub async fn voice_stream(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let base = public_base(&state, &headers);
    xml_response(twiml::connect_stream(&base))
}
