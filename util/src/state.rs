//! Application state shared by the engine services and the binaries.
//!
//! Holds the database connection and the clock every time-dependent rule reads.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Central application state.
///
/// Cheap to clone: the connection is a pool handle and the clock is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates a new `AppState` reading time from the system clock.
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Creates a new `AppState` with an explicit clock, typically a `ManualClock` in tests.
    pub fn with_clock(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Current instant according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
