use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{
    db::{Database, DatabaseHealth},
    errors::ApiError,
    supervisor::{Lifecycle, LifecycleState},
};

/// Handler result; every error ends up in the normalizer's envelope
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Serialize, Deserialize)]
pub struct ResponsePayload {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_health: Option<DatabaseHealth>,
    pub uptime_seconds: u64,
}

// Shared application state
pub struct AppState {
    pub start_time: Instant,
    pub version: String,
    pub lifecycle: Lifecycle,
    /// Absent only when the app is assembled without a database (tests)
    pub db: Option<Database>,
}
