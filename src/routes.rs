use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::{
    error::{envelope_errors, AppError},
    events::TransitionKind,
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/gates/{gate_id}", get(get_gate))
        .route("/gates/{gate_id}/status", get(get_gate_status))
        .route("/gates/{gate_id}/toggle", get(toggle_gate).post(toggle_gate))
        .route("/gates/{gate_id}/open", post(open_gate))
        .route("/gates/{gate_id}/close", post(close_gate))
        .route("/gates/{gate_id}/opening", post(gate_opening))
        .route("/gates/{gate_id}/closing", post(gate_closing))
        .route("/gates/{gate_id}/opened", post(gate_opened))
        .route("/gates/{gate_id}/closed", post(gate_closed))
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn(envelope_errors))
        .with_state(state)
}

fn success<T: Serialize>(data: T) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

fn success_empty() -> Response {
    Json(json!({ "success": true })).into_response()
}

async fn get_gate(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    let gate = state.gates.get_gate(&gate_id).await?;
    let status = state.gates.get_status(&gate_id).await?;

    Ok(success(json!({
        "id": gate.id,
        "name": gate.name,
        "cameras": gate.cameras,
        "status": status,
    })))
}

async fn get_gate_status(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    let status = state.gates.get_status(&gate_id).await?;

    Ok(success(status))
}

async fn toggle_gate(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    let result = state.gates.toggle(&gate_id).await?;

    Ok(success(json!({ "isOpen": result.is_open })))
}

async fn open_gate(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    state.gates.open(&gate_id).await?;

    Ok(success_empty())
}

async fn close_gate(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    state.gates.close(&gate_id).await?;

    Ok(success_empty())
}

// The opening/closing/opened/closed endpoints only feed the event stream.
// They never touch the actuator: the transitional states are reported by
// whoever drives the hardware, not inferred here.
async fn signal(
    state: AppState,
    gate_id: String,
    kind: TransitionKind,
) -> Result<Response, AppError> {
    state.gates.get_gate(&gate_id).await?;

    let event = state.events.publish(&gate_id, kind);

    Ok(success(json!({
        "status": kind.as_str(),
        "timestamp": event.timestamp.to_rfc3339(),
    })))
}

async fn gate_opening(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    signal(state, gate_id, TransitionKind::Opening).await
}

async fn gate_closing(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    signal(state, gate_id, TransitionKind::Closing).await
}

async fn gate_opened(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    signal(state, gate_id, TransitionKind::Opened).await
}

async fn gate_closed(
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<Response, AppError> {
    signal(state, gate_id, TransitionKind::Closed).await
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_events(socket, state))
}

async fn forward_events(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(_) => continue,
                    };

                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("websocket subscriber lagged, dropped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                // inbound frames are ignored, the stream is one-way
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use tokio::sync::broadcast::error::TryRecvError;
    use tower::util::ServiceExt;

    use super::*;
    use crate::{
        controller::GateController,
        error::AppError,
        events::EventBus,
        gates::GateService,
        model::{Gate, GateOperationResult, GateStatus},
        store::{GateStore, MemoryGateStore},
    };

    const GATE_ID: &str = "686eb0ee9984cab163af5d5b";

    struct FixedController {
        result: Result<bool, AppError>,
    }

    #[async_trait]
    impl GateController for FixedController {
        async fn fetch_status(&self, _gate_id: &str) -> Result<GateStatus, AppError> {
            self.result.clone().map(|is_open| GateStatus {
                is_open,
                is_moving: None,
                last_updated: Utc::now(),
            })
        }

        async fn toggle(&self, _gate_id: &str) -> Result<GateOperationResult, AppError> {
            self.result
                .clone()
                .map(|is_open| GateOperationResult { is_open: !is_open })
        }
    }

    async fn test_state(result: Result<bool, AppError>) -> AppState {
        let store = MemoryGateStore::default();
        store
            .put(&Gate {
                id: GATE_ID.to_string(),
                name: "North Entrance".to_string(),
                cameras: None,
            })
            .await
            .unwrap();

        AppState {
            gates: Arc::new(GateService::new(
                Arc::new(store),
                Arc::new(FixedController { result }),
            )),
            events: Arc::new(EventBus::new()),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_read_publishes_no_event() {
        let state = test_state(Ok(true)).await;
        let mut events = state.events.subscribe();

        let app = router(state.clone());
        let response = app
            .oneshot(
                Request::get(format!("/gates/{GATE_ID}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["isOpen"], true);

        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_signal_endpoint_publishes_one_event() {
        let state = test_state(Ok(true)).await;
        let mut events = state.events.subscribe();

        let app = router(state.clone());
        let response = app
            .oneshot(
                Request::post(format!("/gates/{GATE_ID}/opening"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "opening");

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, TransitionKind::Opening);
        assert_eq!(event.gate_id, GATE_ID);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_error_envelope_carries_request_context() {
        let state = test_state(Ok(true)).await;

        let app = router(state);
        let response = app
            .oneshot(
                Request::get("/gates/not-a-gate-id/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["message"], "ID:not-a-gate-id is invalid");
        assert_eq!(body["data"]["path"], "/gates/not-a-gate-id/status");
        assert_eq!(body["data"]["method"], "GET");
        assert_eq!(body["data"]["code"], "Bad Request");
        assert!(body["data"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_controller_timeout_maps_to_gateway_timeout() {
        let state = test_state(Err(AppError::ControllerTimeout)).await;

        let app = router(state);
        let response = app
            .oneshot(
                Request::post(format!("/gates/{GATE_ID}/toggle"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["data"]["code"], "Gateway Timeout");
    }

    #[tokio::test]
    async fn test_unknown_gate_is_a_404_envelope() {
        let state = AppState {
            gates: Arc::new(GateService::new(
                Arc::new(MemoryGateStore::default()),
                Arc::new(FixedController { result: Ok(true) }),
            )),
            events: Arc::new(EventBus::new()),
        };

        let app = router(state);
        let response = app
            .oneshot(
                Request::get(format!("/gates/{GATE_ID}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(
            body["data"]["message"],
            format!("GATE:{GATE_ID} is invalid")
        );
    }

    #[tokio::test]
    async fn test_get_gate_includes_record_and_status() {
        let state = test_state(Ok(false)).await;

        let app = router(state);
        let response = app
            .oneshot(
                Request::get(format!("/gates/{GATE_ID}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["name"], "North Entrance");
        assert_eq!(body["data"]["status"]["isOpen"], false);
    }
}
