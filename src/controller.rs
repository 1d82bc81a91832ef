//! # Gate Controller Client
//!
//! Sole boundary between this service and the physical gate controller.
//!
//! ## Wire contract
//!
//! - `GET  {base}/gate/{gateId}/status` -> `{ "status": "success", "data": { "is_open": bool } }`
//! - `POST {base}/gate/{gateId}/toggle` -> same envelope
//!
//! The controller only exposes a toggle primitive, direction is not
//! selectable. Open/close semantics live in [`crate::gates`].
//!
//! ## Failure classification
//!
//! The controller runs on an embedded board behind a flaky link, so every
//! call is bounded by a timeout and the failure modes are kept apart:
//! callers need to distinguish "unreachable, retry later" from "answered
//! but refused" to decide between retry and abort.
//!
//! - request timeout -> `ControllerTimeout`
//! - connect/DNS failure -> `ControllerUnavailable`
//! - non-2xx, unparseable body, or missing `is_open` -> `ControllerError`
//! - well-formed envelope with `status != "success"` -> `StatusRejected` /
//!   `ToggleRejected`

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::AppError,
    model::{GateOperationResult, GateStatus},
};

pub const CONTROLLER_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait GateController: Send + Sync {
    /// Read the current physical state. Callers validate the gate id first.
    async fn fetch_status(&self, gate_id: &str) -> Result<GateStatus, AppError>;

    /// Flip the current physical state. The response carries the post-toggle
    /// state, which callers must inspect.
    async fn toggle(&self, gate_id: &str) -> Result<GateOperationResult, AppError>;
}

#[derive(Deserialize)]
struct ControllerEnvelope {
    status: String,
    #[serde(default)]
    data: Option<ControllerData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ControllerData {
    is_open: bool,
}

pub struct HttpGateController {
    base_url: String,
    http: Client,
}

impl HttpGateController {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, CONTROLLER_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build http client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, gate_id: &str, action: &str) -> String {
        format!("{}/gate/{}/{}", self.base_url, gate_id, action)
    }

    async fn unwrap_envelope(response: reqwest::Response) -> Result<ControllerEnvelope, AppError> {
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ControllerError(format!(
                "controller returned {status}"
            )));
        }

        response.json::<ControllerEnvelope>().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ControllerTimeout
            } else {
                AppError::ControllerError(format!("malformed controller response: {e}"))
            }
        })
    }
}

fn classify_send_error(error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::ControllerTimeout
    } else if error.is_connect() {
        AppError::ControllerUnavailable(error.to_string())
    } else {
        AppError::ControllerError(error.to_string())
    }
}

fn rejection_message(envelope: &ControllerEnvelope) -> String {
    envelope
        .message
        .clone()
        .unwrap_or_else(|| "controller reported failure".to_string())
}

#[async_trait]
impl GateController for HttpGateController {
    async fn fetch_status(&self, gate_id: &str) -> Result<GateStatus, AppError> {
        let response = self
            .http
            .get(self.url(gate_id, "status"))
            .send()
            .await
            .map_err(classify_send_error)?;

        let envelope = Self::unwrap_envelope(response).await?;
        if envelope.status != "success" {
            return Err(AppError::StatusRejected(rejection_message(&envelope)));
        }

        let data = envelope.data.ok_or_else(|| {
            AppError::ControllerError("controller response missing is_open".to_string())
        })?;

        Ok(GateStatus {
            is_open: data.is_open,
            is_moving: None,
            last_updated: Utc::now(),
        })
    }

    async fn toggle(&self, gate_id: &str) -> Result<GateOperationResult, AppError> {
        let response = self
            .http
            .post(self.url(gate_id, "toggle"))
            .send()
            .await
            .map_err(classify_send_error)?;

        let envelope = Self::unwrap_envelope(response).await?;
        if envelope.status != "success" {
            return Err(AppError::ToggleRejected(rejection_message(&envelope)));
        }

        let data = envelope.data.ok_or_else(|| {
            AppError::ControllerError("controller response missing is_open".to_string())
        })?;

        Ok(GateOperationResult {
            is_open: data.is_open,
        })
    }
}
