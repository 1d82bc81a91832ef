use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("{}:{} is invalid", .field.to_uppercase(), .value)]
    Validation { field: &'static str, value: String },

    #[error("{}:{} is invalid", .entity.to_uppercase(), .id)]
    NotFound { entity: &'static str, id: String },

    #[error("gate controller timed out")]
    ControllerTimeout,

    #[error("gate controller unreachable: {0}")]
    ControllerUnavailable(String),

    #[error("gate controller error: {0}")]
    ControllerError(String),

    #[error("gate controller rejected status read: {0}")]
    StatusRejected(String),

    #[error("gate controller rejected toggle: {0}")]
    ToggleRejected(String),

    #[error("gate did not reach the {expected} state")]
    ActuationFailed { expected: &'static str },

    #[error("database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ControllerTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::ControllerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ControllerError(_)
            | AppError::StatusRejected(_)
            | AppError::ToggleRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::ActuationFailed { .. } | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { field: "id", .. } => "invalid_id",
            AppError::Validation { .. } => "invalid_field",
            AppError::NotFound { .. } => "gate_not_found",
            AppError::ControllerTimeout => "gate_controller_timeout",
            AppError::ControllerUnavailable(_) => "gate_controller_unavailable",
            AppError::ControllerError(_) => "gate_controller_error",
            AppError::StatusRejected(_) => "gate_status_error",
            AppError::ToggleRejected(_) => "gate_toggle_error",
            AppError::ActuationFailed { .. } => "gate_actuation_failed",
            AppError::Database(_) => "database_error",
        }
    }
}

// The envelope needs the request path and method, which the error itself
// never sees. Handlers return a bare status with the error stashed in the
// response extensions; the `envelope_errors` layer fills in the rest.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.status_code().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

pub async fn envelope_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;

    let Some(error) = response.extensions_mut().remove::<AppError>() else {
        return response;
    };

    let status = response.status();
    warn!(kind = error.kind(), %method, path, "request failed: {error}");

    let body = Json(json!({
        "success": false,
        "data": {
            "message": error.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "path": path,
            "method": method.as_str(),
            "code": status.canonical_reason().unwrap_or("Unknown"),
        }
    }));

    (status, body).into_response()
}
