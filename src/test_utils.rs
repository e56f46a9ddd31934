//! Test utilities for ExhibitStream
//!
//! This module provides mock implementations and utilities for testing.

use async_trait::async_trait;
use sqlx::error::{DatabaseError, ErrorKind};
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::Level;

use crate::db::repository::{InteractionRepository, RepositoryError, RepositoryResult};
use crate::diagnostics::{diagnostic_message, DiagnosticSink};
use crate::models::{InteractionKind, NormalizedRecord, RawEvent, RejectionReason};

/// In-memory InteractionRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockInteractionRepository {
    records: Arc<Mutex<Vec<NormalizedRecord>>>,
    fail_next: Arc<Mutex<Option<RepositoryError>>>,
    unhealthy: Arc<Mutex<bool>>,
}

impl MockInteractionRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on the next operation
    pub fn fail_next_operation(&self, error_message: &str) {
        *self.fail_next.lock().unwrap() =
            Some(RepositoryError::QueryExecution(error_message.to_string()));
    }

    /// Configure the next operation to fail the way a CHECK constraint does
    pub fn fail_next_with_constraint_violation(&self, constraint: &str) {
        let violation = CheckViolation::new(constraint);
        *self.fail_next.lock().unwrap() =
            Some(RepositoryError::Database(sqlx::Error::Database(Box::new(violation))));
    }

    /// Make health checks fail until cleared
    pub fn set_unhealthy(&self, unhealthy: bool) {
        *self.unhealthy.lock().unwrap() = unhealthy;
    }

    /// Get all stored records
    pub fn records(&self) -> Vec<NormalizedRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Clear all records
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    fn check_failure(&self) -> RepositoryResult<()> {
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InteractionRepository for MockInteractionRepository {
    async fn insert(&self, record: &NormalizedRecord) -> RepositoryResult<()> {
        self.check_failure()?;
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn count(&self, kind: InteractionKind) -> RepositoryResult<i64> {
        self.check_failure()?;
        let records = self.records.lock().unwrap();
        Ok(records.iter().filter(|r| r.kind() == kind).count() as i64)
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        if *self.unhealthy.lock().unwrap() {
            return Err(RepositoryError::Connection("Mock database is down".to_string()));
        }
        Ok(())
    }
}

/// A PostgreSQL `check_violation` (SQLSTATE 23514) without a server
#[derive(Debug)]
pub struct CheckViolation {
    message: String,
    constraint: String,
}

impl CheckViolation {
    pub fn new(constraint: &str) -> Self {
        Self {
            message: format!("new row violates check constraint \"{}\"", constraint),
            constraint: constraint.to_string(),
        }
    }
}

impl fmt::Display for CheckViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CheckViolation {}

impl DatabaseError for CheckViolation {
    fn message(&self) -> &str {
        &self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23514"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(&self.constraint)
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::CheckViolation
    }
}

/// One captured diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedDiagnostic {
    pub level: Level,
    pub reason: RejectionReason,
    pub message: String,
}

/// Diagnostic sink that keeps everything it is given
#[derive(Debug, Clone, Default)]
pub struct CollectingDiagnostics {
    captured: Arc<Mutex<Vec<CapturedDiagnostic>>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far
    pub fn captured(&self) -> Vec<CapturedDiagnostic> {
        self.captured.lock().unwrap().clone()
    }

    /// Rendered messages reported so far
    pub fn messages(&self) -> Vec<String> {
        self.captured().into_iter().map(|d| d.message).collect()
    }

    /// Reasons reported so far
    pub fn reasons(&self) -> Vec<RejectionReason> {
        self.captured().into_iter().map(|d| d.reason).collect()
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn report(&self, level: Level, event: &RawEvent, reason: RejectionReason) {
        self.captured.lock().unwrap().push(CapturedDiagnostic {
            level,
            reason,
            message: diagnostic_message(event, reason),
        });
    }
}

/// A payload for an event recorded at 17:00 UTC on an open day
pub fn open_hours_payload(site: &str, val: i64, request_type: Option<i64>) -> Vec<u8> {
    let mut event = serde_json::json!({
        "at": "2025-03-11T17:00:00+00:00",
        "site": site,
        "val": val,
    });
    if let Some(request_type) = request_type {
        event["type"] = serde_json::json!(request_type);
    }
    event.to_string().into_bytes()
}
