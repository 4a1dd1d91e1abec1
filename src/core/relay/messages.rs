//! Wire messages for both peers of the streaming relay.
//!
//! # Telephony side (Twilio Media Streams)
//!
//! JSON messages over the `/stream` WebSocket, tagged by `event`:
//! `connected`, `start`, `media`, `mark`, `stop` inbound; `media`, `mark`,
//! `clear` outbound. Audio payloads are base64 µ-law 8 kHz mono frames.
//!
//! # Provider side (OpenAI Realtime API)
//!
//! JSON events tagged by `type`. Client events: `session.update`,
//! `input_audio_buffer.append`, `input_audio_buffer.commit`,
//! `response.create`, `response.cancel`. Server events handled here:
//! `session.created`, `session.updated`,
//! `input_audio_buffer.speech_started`, `input_audio_buffer.speech_stopped`,
//! `response.audio.delta`, `response.done`, `error`; everything else is
//! ignored.

use serde::{Deserialize, Serialize};

// =============================================================================
// Telephony (Twilio Media Streams) protocol
// =============================================================================

/// Messages exchanged with the telephony media stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Handshake notice sent once after the WebSocket opens.
    Connected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },

    /// Stream metadata; carries the call attribution.
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        start: StreamStart,
    },

    /// One audio frame. Inbound frames carry caller audio; outbound frames
    /// carry generated speech and must include the stream sid.
    Media {
        #[serde(
            rename = "streamSid",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        stream_sid: Option<String>,
        media: MediaPayload,
    },

    /// Playback synchronization marker.
    Mark {
        #[serde(
            rename = "streamSid",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        stream_sid: Option<String>,
        mark: MarkPayload,
    },

    /// Outbound only: flush any audio the telephony side has buffered but
    /// not yet played. Used for barge-in preemption.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },

    /// Call ending signal from the telephony side.
    Stop {
        #[serde(
            rename = "streamSid",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        stream_sid: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamStart {
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "accountSid", default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,
    #[serde(rename = "mediaFormat", default, skip_serializing_if = "Option::is_none")]
    pub media_format: Option<MediaFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaFormat {
    pub encoding: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    pub channels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaPayload {
    /// Base64 µ-law audio frame, forwarded verbatim in both directions.
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkPayload {
    pub name: String,
}

impl TelephonyEvent {
    /// Outbound playback frame.
    pub fn media_out(stream_sid: &str, payload: String) -> Self {
        TelephonyEvent::Media {
            stream_sid: Some(stream_sid.to_string()),
            media: MediaPayload {
                payload,
                track: None,
                chunk: None,
                timestamp: None,
            },
        }
    }

    /// Outbound playback synchronization marker.
    pub fn mark_out(stream_sid: &str, name: &str) -> Self {
        TelephonyEvent::Mark {
            stream_sid: Some(stream_sid.to_string()),
            mark: MarkPayload {
                name: name.to_string(),
            },
        }
    }

    pub fn clear_out(stream_sid: &str) -> Self {
        TelephonyEvent::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}

// =============================================================================
// Provider (realtime) protocol
// =============================================================================

/// Session configuration sent once after the provider socket opens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeSessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    /// Telephony audio in and out: g711 µ-law, 8 kHz.
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub turn_detection: TurnDetection,
}

impl RealtimeSessionConfig {
    /// Telephony preset with provider-side VAD enabled for barge-in.
    pub fn telephony(instructions: &str, voice: &str) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: instructions.to_string(),
            voice: voice.to_string(),
            input_audio_format: "g711_ulaw".to_string(),
            output_audio_format: "g711_ulaw".to_string(),
            turn_detection: TurnDetection::ServerVad {
                threshold: None,
                prefix_padding_ms: None,
                silence_duration_ms: None,
                create_response: Some(true),
                interrupt_response: Some(true),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },
}

/// Events this relay sends to the provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ProviderClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: RealtimeSessionConfig },

    /// Append one inbound telephony frame, base64 verbatim.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "response.create")]
    ResponseCreate { response: serde_json::Value },

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ProviderClientEvent {
    pub fn response_create() -> Self {
        ProviderClientEvent::ResponseCreate {
            response: serde_json::json!({}),
        }
    }
}

/// Provider events the relay reacts to. Anything unrecognized is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: RealtimeSessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: RealtimeSessionInfo },

    /// Provider-side VAD detected caller speech: barge-in.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    /// One generated audio frame, base64, forwarded verbatim to telephony.
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        delta: String,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Utterance complete; translated into a telephony `mark`.
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<serde_json::Value>,
    },

    #[serde(rename = "error")]
    Error { error: RealtimeErrorInfo },

    #[serde(other)]
    Unhandled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSessionInfo {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeErrorInfo {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inbound_start_event() {
        let raw = r#"{
            "event": "start",
            "streamSid": "MZ123",
            "start": {
                "callSid": "CA1",
                "accountSid": "AC9",
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            }
        }"#;
        let event: TelephonyEvent = serde_json::from_str(raw).unwrap();
        match event {
            TelephonyEvent::Start { stream_sid, start } => {
                assert_eq!(stream_sid, "MZ123");
                assert_eq!(start.call_sid, "CA1");
                assert_eq!(start.media_format.unwrap().sample_rate, 8000);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_inbound_media_frame() {
        let raw = r#"{"event":"media","media":{"payload":"dGVzdA==","track":"inbound"}}"#;
        let event: TelephonyEvent = serde_json::from_str(raw).unwrap();
        match event {
            TelephonyEvent::Media { media, .. } => assert_eq!(media.payload, "dGVzdA=="),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn outbound_media_carries_stream_sid() {
        let json =
            serde_json::to_value(TelephonyEvent::media_out("MZ1", "YWJj".to_string())).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ1");
        assert_eq!(json["media"]["payload"], "YWJj");
        // Unset frame metadata must not be serialized
        assert!(json["media"].get("track").is_none());
    }

    #[test]
    fn clear_event_serializes_for_barge_in() {
        let json = serde_json::to_value(TelephonyEvent::clear_out("MZ1")).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["streamSid"], "MZ1");
    }

    #[test]
    fn client_events_use_dotted_type_tags() {
        let append = ProviderClientEvent::InputAudioBufferAppend {
            audio: "YWJj".to_string(),
        };
        let json = serde_json::to_value(&append).unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], "YWJj");

        let commit = serde_json::to_value(&ProviderClientEvent::InputAudioBufferCommit).unwrap();
        assert_eq!(commit["type"], "input_audio_buffer.commit");

        let create = serde_json::to_value(&ProviderClientEvent::response_create()).unwrap();
        assert_eq!(create["type"], "response.create");

        let cancel = serde_json::to_value(&ProviderClientEvent::ResponseCancel).unwrap();
        assert_eq!(cancel["type"], "response.cancel");
    }

    #[test]
    fn session_update_carries_telephony_preset() {
        let event = ProviderClientEvent::SessionUpdate {
            session: RealtimeSessionConfig::telephony("persona", "alloy"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["output_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(
            json["session"]["turn_detection"]["interrupt_response"],
            true
        );
    }

    #[test]
    fn parses_provider_audio_delta() {
        let raw = r#"{"type":"response.audio.delta","delta":"YWJj","item_id":"item_1"}"#;
        let event: ProviderServerEvent = serde_json::from_str(raw).unwrap();
        match event {
            ProviderServerEvent::AudioDelta { delta, item_id } => {
                assert_eq!(delta, "YWJj");
                assert_eq!(item_id.as_deref(), Some("item_1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_events_are_tolerated() {
        let raw = r#"{"type":"rate_limits.updated","rate_limits":[]}"#;
        let event: ProviderServerEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ProviderServerEvent::Unhandled));
    }
}
