//! Health, readiness and metrics endpoints for ExhibitStream

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::server::AppState;
use crate::api::{ComponentHealth, HealthResponse, HealthStatus, ReadyResponse, BUILD_INFO};
use crate::db::InteractionRepository;

/// Component name of the database in readiness reports
pub const DATABASE_COMPONENT: &str = "database";

/// Component name of the Kafka consumer in readiness reports
pub const KAFKA_COMPONENT: &str = "kafka";

/// Shared component health
#[derive(Clone, Default)]
pub struct HealthState {
    components: Arc<tokio::sync::RwLock<HashMap<String, ComponentHealth>>>,
}

impl HealthState {
    /// Create a new health state
    pub fn new() -> Self {
        Self::default()
    }

    /// Update component health status
    pub async fn update_component(&self, name: &str, status: HealthStatus, message: Option<String>) {
        let mut components = self.components.write().await;
        components.insert(
            name.to_string(),
            ComponentHealth {
                status,
                message,
                last_check: Utc::now(),
            },
        );
    }

    /// Current health of every component
    pub async fn components(&self) -> HashMap<String, ComponentHealth> {
        self.components.read().await.clone()
    }

    /// Get overall health status
    ///
    /// No reports yet means not ready.
    pub async fn get_status(&self) -> HealthStatus {
        let components = self.components.read().await;

        if components.is_empty()
            || components.values().any(|c| c.status == HealthStatus::Unhealthy)
        {
            return HealthStatus::Unhealthy;
        }

        if components.values().any(|c| c.status == HealthStatus::Degraded) {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }
}

/// Basic liveness check endpoint
///
/// Returns 200 OK while the process is running; no dependency is checked.
pub async fn health_check() -> Response {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Service is running".to_string()),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Readiness check endpoint
///
/// Aggregates the last reported health of the database and the consumer.
pub async fn ready_check(State(state): State<AppState>) -> Response {
    let checks = state.health.components().await;
    let overall_status = state.health.get_status().await;

    let response = ReadyResponse {
        status: overall_status,
        checks,
        timestamp: Utc::now(),
    };

    (overall_status.to_status_code(), Json(response)).into_response()
}

/// Build information endpoint
pub async fn build_info() -> Response {
    (StatusCode::OK, Json(&BUILD_INFO)).into_response()
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.stats.render_prometheus(),
    )
        .into_response()
}

/// Check database connectivity through the repository
pub async fn check_database_health(repo: &dyn InteractionRepository) -> ComponentHealth {
    let (status, message) = match repo.health_check().await {
        Ok(()) => (HealthStatus::Healthy, Some("Database is reachable".to_string())),
        Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
    };

    ComponentHealth {
        status,
        message,
        last_check: Utc::now(),
    }
}

/// Background task that refreshes database health every 30 seconds
pub async fn health_monitor(
    state: HealthState,
    repo: Arc<dyn InteractionRepository>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("Health monitor stopped");
                    return;
                }
            }
            _ = interval.tick() => {
                let health = check_database_health(repo.as_ref()).await;
                if !health.status.is_healthy() {
                    tracing::warn!(message = ?health.message, "Database health check failed");
                }
                state
                    .update_component(DATABASE_COMPONENT, health.status, health.message)
                    .await;
                tracing::debug!("Health check completed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PipelineStats;
    use crate::test_utils::MockInteractionRepository;

    fn app_state() -> AppState {
        AppState {
            health: HealthState::new(),
            stats: Arc::new(PipelineStats::new()),
        }
    }

    #[tokio::test]
    async fn test_health_state() {
        let state = HealthState::new();

        // Nothing reported yet
        assert_eq!(state.get_status().await, HealthStatus::Unhealthy);

        state.update_component(DATABASE_COMPONENT, HealthStatus::Healthy, None).await;
        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        state
            .update_component(KAFKA_COMPONENT, HealthStatus::Degraded, None)
            .await;
        assert_eq!(state.get_status().await, HealthStatus::Degraded);

        state
            .update_component(
                DATABASE_COMPONENT,
                HealthStatus::Unhealthy,
                Some("Connection failed".to_string()),
            )
            .await;
        assert_eq!(state.get_status().await, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let response = health_check().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_check_endpoint() {
        let state = app_state();
        state
            .health
            .update_component(DATABASE_COMPONENT, HealthStatus::Healthy, None)
            .await;
        state
            .health
            .update_component(KAFKA_COMPONENT, HealthStatus::Healthy, None)
            .await;

        let response = ready_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_check_before_any_report() {
        let response = ready_check(State(app_state())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_check_database_health() {
        let repo = MockInteractionRepository::new();
        assert!(check_database_health(&repo).await.status.is_healthy());

        repo.set_unhealthy(true);
        let health = check_database_health(&repo).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.message.unwrap().contains("Mock database is down"));
    }

    #[tokio::test]
    async fn test_health_monitor_reports_and_stops() {
        let state = HealthState::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = tokio::spawn(health_monitor(
            state.clone(),
            Arc::new(MockInteractionRepository::new()),
            shutdown_rx,
        ));

        // the first tick fires immediately
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        shutdown_tx.send(true).unwrap();
        monitor.await.unwrap();
    }
}
