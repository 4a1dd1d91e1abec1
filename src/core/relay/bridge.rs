//! The streaming relay bridge.
//!
//! Joins one telephony media stream to one realtime provider connection and
//! pumps frames between them until either side ends. Audio crosses the
//! bridge as opaque base64 µ-law; nothing here decodes it.
//!
//! Lifecycle: the provider session is configured before any caller audio is
//! forwarded, caller frames flow up and generated frames flow down while the
//! bridge is active, a telephony `stop` drains the input buffer and requests
//! one final response, and a close on either side closes both.

use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::time::MissedTickBehavior;

use super::messages::{
    ProviderClientEvent, ProviderServerEvent, RealtimeSessionConfig, TelephonyEvent,
};
use super::provider::{ProviderMessage, ProviderSocket};
use crate::core::registry::SessionRegistry;
use crate::core::session::TurnPhase;
use crate::errors::app_error::TransportError;

/// Name of the playback marker emitted after each completed utterance.
const SEGMENT_MARK: &str = "segment-complete";

/// How long a stopped call may wait for its final response to drain.
const DRAIN_DEADLINE: Duration = Duration::from_secs(3);

/// Relay settings captured from server config at upgrade time.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub persona: String,
    pub voice: String,
    pub keepalive_interval: Duration,
}

/// Bridge connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    /// Waiting for the provider to acknowledge the session configuration.
    Connecting,
    /// Both peers live, frames flowing.
    Active,
    /// Telephony sent `stop`; final response requested.
    Closing,
}

/// One live call bridge. Consumes both sockets; returns when the call ends.
pub struct StreamBridge {
    telephony: WebSocket,
    provider: ProviderSocket,
    config: RelayConfig,
    registry: SessionRegistry,
}

impl StreamBridge {
    pub fn new(
        telephony: WebSocket,
        provider: ProviderSocket,
        config: RelayConfig,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            telephony,
            provider,
            config,
            registry,
        }
    }

    /// Run the bridge to completion. Always closes both peers before
    /// returning, whatever ended the call.
    pub async fn run(mut self) {
        let mut state = RelayState::Connecting;
        let mut stream_sid: Option<String> = None;
        let mut call_id: Option<String> = None;

        // Configure the provider session before any audio is forwarded.
        let session = RealtimeSessionConfig::telephony(&self.config.persona, &self.config.voice);
        if let Err(e) = self
            .provider
            .send_event(&ProviderClientEvent::SessionUpdate { session })
            .await
        {
            tracing::error!(error = %e, "failed to configure provider session");
            let _ = self.telephony.close().await;
            return;
        }

        let mut keepalive = tokio::time::interval(self.config.keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        keepalive.tick().await; // the first tick fires immediately

        // Armed when telephony sends `stop`; a provider that never finishes
        // its final response must not keep both sockets open.
        let mut drain_deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                inbound = self.telephony.next() => {
                    let message = match inbound {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "telephony stream error, closing bridge");
                            break;
                        }
                        None => {
                            tracing::info!("telephony stream closed");
                            break;
                        }
                    };

                    match message {
                        WsMessage::Text(text) => {
                            let event = match serde_json::from_str::<TelephonyEvent>(&text) {
                                Ok(e) => e,
                                Err(e) => {
                                    tracing::warn!(error = %e, "unparseable telephony event, skipping");
                                    continue;
                                }
                            };
                            let done = self
                                .on_telephony_event(event, &mut state, &mut stream_sid, &mut call_id)
                                .await;
                            if done {
                                break;
                            }
                            if state == RelayState::Closing && drain_deadline.is_none() {
                                drain_deadline =
                                    Some(tokio::time::Instant::now() + DRAIN_DEADLINE);
                            }
                        }
                        WsMessage::Close(_) => {
                            tracing::info!(call_id = call_id.as_deref(), "telephony sent close");
                            break;
                        }
                        WsMessage::Ping(data) => {
                            if self.telephony.send(WsMessage::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        _ => {}
                    }
                }

                outbound = self.provider.next() => {
                    match outbound {
                        ProviderMessage::Event(event) => {
                            let done = self
                                .on_provider_event(event, &mut state, stream_sid.as_deref())
                                .await;
                            if done {
                                break;
                            }
                        }
                        ProviderMessage::Ping(data) => {
                            if self.provider.pong(data).await.is_err() {
                                break;
                            }
                        }
                        ProviderMessage::Closed => {
                            tracing::info!(call_id = call_id.as_deref(), "provider stream closed");
                            break;
                        }
                    }
                }

                _ = async {
                    match drain_deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    tracing::warn!(
                        call_id = call_id.as_deref(),
                        "final response did not drain before the deadline, closing bridge"
                    );
                    break;
                }

                _ = keepalive.tick() => {
                    // Keepalive failures are advisory; the main arms detect a
                    // genuinely dead peer.
                    if let Err(e) = self.provider.ping().await {
                        tracing::warn!(error = %e, "provider keepalive failed");
                    }
                    if let Err(e) = self.telephony.send(WsMessage::Ping(Vec::new().into())).await {
                        tracing::warn!(error = %e, "telephony keepalive failed");
                    }
                }
            }
        }

        self.provider.close().await;
        let _ = self.telephony.close().await;

        if let Some(id) = call_id {
            if let Some(slot) = self.registry.get(&id) {
                let mut session = slot.session.lock().await;
                session.ended = true;
                session.phase = TurnPhase::Closed;
            }
            self.registry.remove(&id);
            tracing::info!(call_id = %id, "bridge ended, session removed");
        }
    }

    /// Handle one telephony event. Returns true when the bridge is done.
    async fn on_telephony_event(
        &mut self,
        event: TelephonyEvent,
        state: &mut RelayState,
        stream_sid: &mut Option<String>,
        call_id: &mut Option<String>,
    ) -> bool {
        match event {
            TelephonyEvent::Connected { .. } => false,

            TelephonyEvent::Start {
                stream_sid: sid,
                start,
            } => {
                tracing::info!(
                    stream_sid = %sid,
                    call_sid = %start.call_sid,
                    "media stream started"
                );
                let slot = self.registry.get_or_create(&start.call_sid, "");
                slot.touch();
                {
                    let mut session = slot.session.lock().await;
                    session.greeted = true;
                    session.phase = TurnPhase::Listening;
                }
                *stream_sid = Some(sid);
                *call_id = Some(start.call_sid);
                false
            }

            TelephonyEvent::Media { media, .. } => {
                // Never forward audio into an unconfigured session.
                if *state == RelayState::Connecting {
                    return false;
                }
                if let Some(id) = call_id.as_deref()
                    && let Some(slot) = self.registry.get(id)
                {
                    slot.touch();
                }
                let append = ProviderClientEvent::InputAudioBufferAppend {
                    audio: media.payload,
                };
                if let Err(e) = self.provider.send_event(&append).await {
                    tracing::warn!(error = %e, "failed to forward caller audio");
                    return true;
                }
                false
            }

            TelephonyEvent::Mark { mark, .. } => {
                tracing::debug!(mark = %mark.name, "playback marker acknowledged");
                false
            }

            TelephonyEvent::Stop { .. } => {
                tracing::info!(call_id = call_id.as_deref(), "caller hung up");
                // Flush whatever the caller said last so the provider sees a
                // complete conversation, then let the final response drain.
                let _ = self
                    .provider
                    .send_event(&ProviderClientEvent::InputAudioBufferCommit)
                    .await;
                let _ = self
                    .provider
                    .send_event(&ProviderClientEvent::response_create())
                    .await;
                // Stay in the loop until the final response drains; the
                // telephony side closing its socket also ends the bridge.
                *state = RelayState::Closing;
                false
            }

            // Clear is outbound-only; a telephony peer never sends it.
            TelephonyEvent::Clear { .. } => false,
        }
    }

    /// Handle one provider event. Returns true when the bridge is done.
    async fn on_provider_event(
        &mut self,
        event: ProviderServerEvent,
        state: &mut RelayState,
        stream_sid: Option<&str>,
    ) -> bool {
        match event {
            ProviderServerEvent::SessionCreated { session } => {
                tracing::debug!(session_id = %session.id, "provider session created");
                false
            }

            ProviderServerEvent::SessionUpdated { session } => {
                tracing::info!(session_id = %session.id, "provider session configured");
                if *state == RelayState::Connecting {
                    *state = RelayState::Active;
                }
                false
            }

            ProviderServerEvent::SpeechStarted { .. } => {
                // Barge-in: the caller started talking over playback. Cancel
                // the in-flight response and flush the telephony playback
                // buffer so stale audio stops immediately.
                if let Err(e) = self
                    .provider
                    .send_event(&ProviderClientEvent::ResponseCancel)
                    .await
                {
                    tracing::warn!(error = %e, "failed to cancel interrupted response");
                    return true;
                }
                if let Some(sid) = stream_sid {
                    tracing::debug!("caller barge-in, clearing playback buffer");
                    if let Err(e) = self.send_telephony(&TelephonyEvent::clear_out(sid)).await {
                        tracing::warn!(error = %e, "telephony send failed, closing bridge");
                        return true;
                    }
                }
                false
            }

            ProviderServerEvent::SpeechStopped { .. } => false,

            ProviderServerEvent::AudioDelta { delta, .. } => {
                let Some(sid) = stream_sid else {
                    // Audio before `start` has nowhere to go.
                    return false;
                };
                match self.send_telephony(&TelephonyEvent::media_out(sid, delta)).await {
                    Ok(()) => false,
                    Err(e) => {
                        tracing::warn!(error = %e, "telephony send failed, closing bridge");
                        true
                    }
                }
            }

            ProviderServerEvent::ResponseDone { .. } => {
                if let Some(sid) = stream_sid
                    && let Err(e) = self
                        .send_telephony(&TelephonyEvent::mark_out(sid, SEGMENT_MARK))
                        .await
                {
                    tracing::warn!(error = %e, "telephony send failed, closing bridge");
                    return true;
                }
                // The post-hangup response has drained; nothing left to do.
                *state == RelayState::Closing
            }

            ProviderServerEvent::Error { error } => {
                tracing::error!(
                    error_type = error.error_type.as_deref().unwrap_or("unknown"),
                    message = %error.message,
                    "provider reported an error"
                );
                false
            }

            ProviderServerEvent::Unhandled => false,
        }
    }

    async fn send_telephony(&mut self, event: &TelephonyEvent) -> Result<(), TransportError> {
        let json = serde_json::to_string(event)
            .map_err(|e| TransportError::Telephony(e.to_string()))?;
        self.telephony
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| TransportError::Telephony(e.to_string()))
    }
}
