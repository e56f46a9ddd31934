//! ExhibitStream Library
//!
//! Validation and normalization of museum floor interaction events. Exposes
//! the pipeline stages for the binary and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod models;
pub mod stats;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{Error, Result};

// Re-export model types
pub use models::{
    decode, normalize, EventValidator, InteractionKind, NormalizedRecord, RawEvent,
    RejectionReason, ValidatedEvent, ValidationRules,
};

pub use diagnostics::{DiagnosticSink, TracingDiagnostics};
pub use stats::{PipelineStats, StatsSnapshot};

// Re-export API server functions
pub use api::server::{create_router, create_server, shutdown_signal, AppState};

// Re-export health check types
pub use api::{
    BuildInfo, ComponentHealth, HealthResponse, HealthState, HealthStatus, ReadyResponse,
};
