use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Stored record keys are 24-character hex strings.
pub const GATE_ID_LEN: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: String,
    pub name: String,
    /// The camera association is an optional capability of the record
    /// store; nothing in the gate-control paths may assume it is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cameras: Option<GateCameras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCameras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<GateCamera>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<GateCamera>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCamera {
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub stream_url: String,
}

fn default_active() -> bool {
    true
}

/// A point-in-time observation from the controller, never cached across
/// requests. The physical gate can change state out-of-band.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_moving: Option<bool>,
    pub last_updated: DateTime<Utc>,
}

/// Outcome of a toggle command, carrying the post-toggle state.
#[derive(Debug, Clone, Copy)]
pub struct GateOperationResult {
    pub is_open: bool,
}

pub fn validate_gate_id(id: &str) -> Result<(), AppError> {
    if id.len() == GATE_ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(AppError::Validation {
            field: "id",
            value: id.to_string(),
        })
    }
}

impl Gate {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_gate_id(&self.id)?;

        if self.name.trim().is_empty()
            || !self.name.chars().all(|c| c.is_alphabetic() || c == ' ')
        {
            return Err(AppError::Validation {
                field: "name",
                value: self.name.clone(),
            });
        }

        if let Some(cameras) = &self.cameras {
            for camera in [&cameras.entry, &cameras.exit].into_iter().flatten() {
                camera.validate()?;
            }
        }

        Ok(())
    }
}

impl GateCamera {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name",
                value: self.name.clone(),
            });
        }

        let url_ok = ["http://", "https://", "rtsp://"]
            .iter()
            .any(|scheme| self.stream_url.starts_with(scheme))
            && self.stream_url.len() > "http://".len();

        if !url_ok {
            return Err(AppError::Validation {
                field: "streamUrl",
                value: self.stream_url.clone(),
            });
        }

        Ok(())
    }
}
