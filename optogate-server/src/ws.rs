//! WebSocket front end implementing §6's wire protocol: one CBOR- or
//! JSON-framed `frame` message in, exactly one `sync` message out, per
//! connection-owned `Gater` (§5: the core is single-threaded per session).
//! Router construction follows the teacher's `flydra2::model_server`
//! (`axum::Router` + `with_state` + `tokio::net::TcpListener` +
//! `axum::serve`); the upgrade handler itself follows axum's documented
//! WebSocket pattern, which the teacher workspace does not otherwise use.

use std::sync::Arc;

use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};

use optogate_core::GaterSettings;
use optogate_wire::{frame_to_payload, payload_to_frame, Message, SyncPayload};

use crate::config::ServerConfig;
use crate::session::GatingSession;

#[derive(Clone)]
struct AppState {
    config: Arc<ServerConfig>,
}

const WS_ROUTE: &str = "/ws";

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr;
    let state = AppState {
        config: Arc::new(config),
    };

    let router = Router::new()
        .route(WS_ROUTE, get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("optogate server listening on ws://{addr}{WS_ROUTE}");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let settings = match GaterSettings::new(state.config.gater.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "invalid gater settings, refusing connection");
            return;
        }
    };
    let mut session = GatingSession::new(
        settings,
        state.config.period_dir.clone(),
        Box::new(optogate_trigger::LoggingTriggerSink::default()),
    );

    while let Some(next) = stream.next().await {
        let ws_msg = match next {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "websocket read error, closing connection");
                break;
            }
        };

        let bytes: Vec<u8> = match ws_msg {
            WsMessage::Binary(b) => b.to_vec(),
            WsMessage::Text(t) => t.to_string().into_bytes(),
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
        };

        let parsed: Result<Message, _> = serde_cbor::from_slice(&bytes)
            .map_err(|e| e.to_string())
            .or_else(|e| serde_json::from_slice(&bytes).map_err(|_| e));

        let message = match parsed {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed or unknown message");
                continue;
            }
        };

        let Message::Frame { frame: payload } = message else {
            tracing::warn!("dropping unexpected sync message from client");
            continue;
        };

        let frame = match payload_to_frame(&payload) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame message");
                continue;
            }
        };

        let outcome = match session.process_frame(frame) {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "fatal error processing frame, closing session");
                break;
            }
        };

        let reply = Message::Sync {
            sync: SyncPayload {
                send_trigger: outcome.send_trigger,
                trigger_time: outcome.trigger_time.unwrap_or(0.0),
                phase: outcome.phase,
            },
        };
        let Ok(encoded) = serde_cbor::to_vec(&reply) else {
            tracing::error!("failed to encode sync reply");
            continue;
        };
        if sink.send(WsMessage::Binary(encoded.into())).await.is_err() {
            break;
        }
    }
}

/// Round-trip the payload conversion used on every incoming `frame`
/// message, matching the teacher's preference for a small, focused unit
/// test per adapter function rather than exercising it only through the
/// full socket.
#[cfg(test)]
mod tests {
    use super::*;
    use optogate_wire::{FrameMetadata, FramePayload, PixelDtype};

    #[test]
    fn frame_payload_converts_to_core_frame() {
        let payload = FramePayload {
            height: 2,
            width: 2,
            dtype: PixelDtype::Uint8,
            data: vec![1, 2, 3, 4],
            metadata: FrameMetadata::new(1.5),
        };
        let frame = payload_to_frame(&payload).unwrap();
        assert_eq!(frame.timestamp_s, 1.5);
        let back = frame_to_payload(&frame);
        assert_eq!(back.data, payload.data);
    }
}
