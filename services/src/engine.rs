use crate::biometric::{DistanceMatcher, FaceMatcher};
use crate::locks::TeacherLocks;
use crate::settings::EngineSettings;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use util::state::AppState;

/// Entry point of the attendance engine.
///
/// Operations are grouped by concern in the sibling modules
/// (`administration`, `session_lifecycle`, `attendance_ledger`, `reports`),
/// each adding an `impl Engine` block. Cloning is cheap and clones share the
/// per-teacher locks.
#[derive(Clone)]
pub struct Engine {
    state: AppState,
    settings: EngineSettings,
    matcher: Arc<dyn FaceMatcher>,
    locks: TeacherLocks,
}

impl Engine {
    pub fn new(state: AppState, settings: EngineSettings, matcher: Arc<dyn FaceMatcher>) -> Self {
        Self {
            state,
            settings,
            matcher,
            locks: TeacherLocks::new(),
        }
    }

    /// Engine configured from the global `AppConfig`, with the distance matcher.
    pub fn from_config(state: AppState) -> Self {
        let settings = EngineSettings::from_config();
        let matcher = Arc::new(DistanceMatcher::new(settings.face_match_threshold));
        Self::new(state, settings, matcher)
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.state.db()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn matcher(&self) -> &dyn FaceMatcher {
        self.matcher.as_ref()
    }

    pub(crate) fn locks(&self) -> &TeacherLocks {
        &self.locks
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.state.now()
    }
}
