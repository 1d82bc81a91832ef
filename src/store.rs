//! # Gate Record Store
//!
//! Persistence for gate identity and static config.
//!
//! ## Requirements
//!
//! - Small dataset, a handful of gates per facility
//! - Reads on every gate operation, writes only on administrative changes
//! - Live open/closed status is NOT stored here, it is always fetched from
//!   the controller
//!
//! ## Implementation
//!
//! - Redis hash: one `gates` key, field per gate id, JSON value
//! - Field validation happens on every write
//! - An in-memory implementation backs the tests

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use tokio::sync::RwLock;

use crate::{error::AppError, model::Gate};

const GATES_KEY: &str = "gates";

#[async_trait]
pub trait GateStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Gate>, AppError>;

    /// Insert or replace a gate record. Implementations validate the record
    /// before writing.
    async fn put(&self, gate: &Gate) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn list(&self) -> Result<Vec<Gate>, AppError>;
}

pub struct RedisGateStore {
    connection: ConnectionManager,
}

impl RedisGateStore {
    pub async fn connect(redis_url: &str) -> Self {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url).unwrap();
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .unwrap();

        Self { connection }
    }
}

fn database_error(error: impl std::fmt::Display) -> AppError {
    AppError::Database(error.to_string())
}

#[async_trait]
impl GateStore for RedisGateStore {
    async fn get(&self, id: &str) -> Result<Option<Gate>, AppError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .hget(GATES_KEY, id)
            .await
            .map_err(database_error)?;

        raw.map(|raw| serde_json::from_str(&raw).map_err(database_error))
            .transpose()
    }

    async fn put(&self, gate: &Gate) -> Result<(), AppError> {
        gate.validate()?;

        let raw = serde_json::to_string(gate).map_err(database_error)?;
        let mut connection = self.connection.clone();
        let _: i64 = connection
            .hset(GATES_KEY, &gate.id, raw)
            .await
            .map_err(database_error)?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection
            .hdel(GATES_KEY, id)
            .await
            .map_err(database_error)?;

        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<Gate>, AppError> {
        let mut connection = self.connection.clone();
        let raw: HashMap<String, String> = connection
            .hgetall(GATES_KEY)
            .await
            .map_err(database_error)?;

        raw.values()
            .map(|raw| serde_json::from_str(raw).map_err(database_error))
            .collect()
    }
}

/// In-memory store used by the test suites.
#[derive(Default)]
pub struct MemoryGateStore {
    gates: RwLock<HashMap<String, Gate>>,
}

#[async_trait]
impl GateStore for MemoryGateStore {
    async fn get(&self, id: &str) -> Result<Option<Gate>, AppError> {
        Ok(self.gates.read().await.get(id).cloned())
    }

    async fn put(&self, gate: &Gate) -> Result<(), AppError> {
        gate.validate()?;

        self.gates
            .write()
            .await
            .insert(gate.id.clone(), gate.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.gates.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<Gate>, AppError> {
        Ok(self.gates.read().await.values().cloned().collect())
    }
}
