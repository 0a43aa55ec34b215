use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::counter_store::CounterStore;
use crate::db::{Database, DatabaseHealth};
use crate::errors::AppError;

// Custom result type for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize, Deserialize)]
pub struct ResponsePayload {
    pub status: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CounterStoreHealth {
    pub backend: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db_health: DatabaseHealth,
    pub counter_store: CounterStoreHealth,
    pub uptime_seconds: u64,
}

// Shared state for the operational endpoints
pub struct AppState {
    pub start_time: Instant,
    pub db: Database,
    pub counter_store: Arc<dyn CounterStore>,
    pub version: String,
}
