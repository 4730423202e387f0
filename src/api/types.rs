use crate::api::error::ApiError;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Shared per-process state. All business data lives in SQLite; the mutex
/// serializes statement execution across workers, which matches the
/// one-statement-at-a-time behavior the dashboards were written against.
pub struct AppState {
    pub db: Mutex<Connection>,
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(conn: Connection, jwt_secret: impl Into<String>) -> Self {
        AppState {
            db: Mutex::new(conn),
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database mutex poisoned"))
    }
}
