//! Teacher attendance and in-class presence engine.
//!
//! [`Engine`] owns the database handle, the clock, the tunables and the face
//! matcher. Its operations live in the concern modules below.

pub mod administration;
pub mod attendance_ledger;
pub mod biometric;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod locks;
pub mod metrics;
pub mod reports;
pub mod session_lifecycle;
pub mod settings;
pub mod snapshot;

pub use biometric::{DistanceMatcher, Embedding, FaceMatcher};
pub use calendar::DateRange;
pub use engine::Engine;
pub use error::{EngineError, EngineResult, WindowMiss};
pub use metrics::{MetricsReport, Performance, PerformanceCategory, Standing};
pub use session_lifecycle::{SlotState, TickOutcome};
pub use settings::EngineSettings;
