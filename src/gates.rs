//! # Gate Operations
//!
//! Turns the controller's raw primitives into the operations the API
//! exposes.
//!
//! The controller only knows how to toggle. Open and close are built on
//! top: read the fresh status, skip the actuator entirely if the gate is
//! already in the requested state, otherwise toggle once and verify the
//! reported post-state. A toggle whose HTTP call succeeded but whose
//! result contradicts the requested direction is an actuation failure
//! (obstruction, hardware fault), not a success.
//!
//! There are no automatic retries. A blind retry against a physical
//! actuator risks toggling back what the previous attempt just moved.
//!
//! Concurrent open/close on the same gate id are serialized by a per-gate
//! lock, so two racing requests cannot observe "closed" together and
//! double-toggle. The raw toggle endpoint stays unserialized, it is the
//! primitive and callers own its semantics.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    controller::GateController,
    error::AppError,
    model::{validate_gate_id, Gate, GateOperationResult, GateStatus},
    store::GateStore,
};

pub struct GateService {
    store: Arc<dyn GateStore>,
    controller: Arc<dyn GateController>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GateService {
    pub fn new(store: Arc<dyn GateStore>, controller: Arc<dyn GateController>) -> Self {
        Self {
            store,
            controller,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_gate(&self, gate_id: &str) -> Result<Gate, AppError> {
        validate_gate_id(gate_id)?;

        self.store
            .get(gate_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                entity: "gate",
                id: gate_id.to_string(),
            })
    }

    /// Fresh status read, no caching: the gate can move out-of-band
    /// (manual override, sensor fault).
    pub async fn get_status(&self, gate_id: &str) -> Result<GateStatus, AppError> {
        self.get_gate(gate_id).await?;
        self.controller.fetch_status(gate_id).await
    }

    pub async fn toggle(&self, gate_id: &str) -> Result<GateOperationResult, AppError> {
        self.get_gate(gate_id).await?;
        self.controller.toggle(gate_id).await
    }

    pub async fn open(&self, gate_id: &str) -> Result<(), AppError> {
        self.actuate(gate_id, true).await
    }

    pub async fn close(&self, gate_id: &str) -> Result<(), AppError> {
        self.actuate(gate_id, false).await
    }

    async fn actuate(&self, gate_id: &str, target_open: bool) -> Result<(), AppError> {
        self.get_gate(gate_id).await?;

        let lock = self.gate_lock(gate_id).await;
        let _guard = lock.lock().await;

        let status = self.controller.fetch_status(gate_id).await?;
        if status.is_open == target_open {
            info!(gate_id, "gate already {}", direction_name(target_open));
            return Ok(());
        }

        // The toggle response carries the post-state; the HTTP call
        // succeeding says nothing about the physical gate.
        let result = self.controller.toggle(gate_id).await?;
        if result.is_open != target_open {
            return Err(AppError::ActuationFailed {
                expected: direction_name(target_open),
            });
        }

        info!(gate_id, "gate now {}", direction_name(target_open));
        Ok(())
    }

    // One lock per gate id, kept for the process lifetime. The gate
    // population is a handful of records, so the map never needs pruning.
    async fn gate_lock(&self, gate_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(gate_id.to_string()).or_default().clone()
    }
}

fn direction_name(open: bool) -> &'static str {
    if open {
        "open"
    } else {
        "closed"
    }
}
