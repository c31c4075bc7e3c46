//! HTTP API: request entry point, metrics snapshot, audit trail queries.

use crate::error::{ApiError, ApiResult};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use ztmc_enforcement::{EnforcementError, EnforcementPoint};
use ztmc_monitor::CentralMonitor;
use ztmc_policy::PolicyStore;
use ztmc_types::{AccessRequest, EventRecord, MetricsSnapshot};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub enforcement: Arc<EnforcementPoint>,
    pub monitor: Arc<CentralMonitor>,
    pub policy_store: Arc<PolicyStore>,
    pub started_at: DateTime<Utc>,
    pub version: String,
}

impl AppState {
    pub fn new(
        enforcement: Arc<EnforcementPoint>,
        monitor: Arc<CentralMonitor>,
        policy_store: Arc<PolicyStore>,
    ) -> Self {
        Self {
            enforcement,
            monitor,
            policy_store,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/access", post(evaluate_access))
        .route("/metrics", get(metrics_snapshot))
        .route("/events", get(list_events))
        .route("/policies/reload", post(reload_policies));

    Router::new()
        .route("/healthz", get(health_check))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Body of the request entry point.
#[derive(Debug, Deserialize)]
pub struct AccessRequestBody {
    pub user: String,
    pub action: String,
    pub resource: String,
    pub source_ip: String,
    pub device_id: String,
}

/// Decision returned to the caller. Always well-formed, even when
/// remediation or audit writes degraded.
#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub decision: String,
    pub reason: String,
    pub cloud: String,
}

/// The request entry point: run one request through the pipeline.
pub async fn evaluate_access(
    State(state): State<AppState>,
    Json(body): Json<AccessRequestBody>,
) -> ApiResult<Json<AccessResponse>> {
    let request = AccessRequest::new(
        body.user,
        body.action,
        body.resource,
        body.source_ip,
        body.device_id,
    );

    let outcome = state
        .enforcement
        .enforce(request)
        .await
        .map_err(|err: EnforcementError| ApiError::BadRequest(err.to_string()))?;

    Ok(Json(AccessResponse {
        decision: outcome.decision.to_string(),
        reason: outcome.reason,
        cloud: outcome.cloud.to_string(),
    }))
}

/// Point-in-time metrics snapshot for dashboards. Not authoritative; the
/// audit log is.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.monitor.snapshot().await)
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return only the newest `limit` records.
    pub limit: Option<usize>,
}

/// Read the audit trail (append order; optionally the newest records only).
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let mut events = state
        .monitor
        .events()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    if let Some(limit) = query.limit {
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
    }

    Ok(Json(events))
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub policies: usize,
}

/// Re-parse the policy document and swap it in. A failed reload keeps the
/// last-known-good set and reports the parse error.
pub async fn reload_policies(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let count = state
        .policy_store
        .reload()
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let source = state
        .policy_store
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<embedded>".to_string());
    let record = EventRecord::policy_reload(source, format!("{count} policies active"));
    if let Err(err) = state.monitor.record(record).await {
        tracing::warn!(error = %err, "failed to record policy reload event");
    }

    Ok(Json(ReloadResponse { policies: count }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    /// Latched when the audit trail became unwritable.
    pub audit_alarm: bool,
}

/// Health endpoint; reports the audit alarm so operators see degraded mode.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let alarm = state.monitor.alarm_raised();
    Json(HealthResponse {
        status: if alarm { "degraded" } else { "healthy" }.to_string(),
        version: state.version.clone(),
        started_at: state.started_at,
        audit_alarm: alarm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztmc_policy::{
        ContextEvaluator, DecisionPoint, Policy, PolicyConditions, PolicySet, TrustConfig,
    };
    use ztmc_remediation::Remediator;
    use ztmc_types::Decision;

    fn test_state() -> AppState {
        let monitor = Arc::new(CentralMonitor::in_memory());
        let store = Arc::new(PolicyStore::from_set(PolicySet {
            policies: vec![Policy {
                conditions: PolicyConditions {
                    action: vec!["s3:getobject".to_string()],
                },
                decision: Decision::Allow,
                description: "object storage reads are permitted".to_string(),
            }],
            default_decision: Decision::Deny,
        }));
        let pdp = Arc::new(DecisionPoint::new(
            Arc::clone(&store),
            ContextEvaluator::new(TrustConfig {
                // Full-day window keeps these tests independent of the
                // wall clock.
                business_hours: (0, 24),
                ..TrustConfig::default()
            }),
        ));
        let remediator = Arc::new(Remediator::new(Arc::clone(&monitor)));
        let enforcement = Arc::new(EnforcementPoint::new(
            pdp,
            remediator,
            Arc::clone(&monitor),
        ));
        AppState::new(enforcement, monitor, store)
    }

    #[tokio::test]
    async fn access_endpoint_returns_decision_and_reason() {
        let state = test_state();
        let response = evaluate_access(
            State(state),
            Json(AccessRequestBody {
                user: "alice".to_string(),
                action: "S3:GetObject".to_string(),
                resource: "arn:aws:s3:::secure-bucket".to_string(),
                source_ip: "192.168.1.12".to_string(),
                device_id: "device-laptop-001".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.decision, "ALLOW");
        assert_eq!(response.0.reason, "context validated");
        assert_eq!(response.0.cloud, "AWS");
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let state = test_state();
        let err = evaluate_access(
            State(state.clone()),
            Json(AccessRequestBody {
                user: String::new(),
                action: "s3:GetObject".to_string(),
                resource: "arn:aws:s3:::secure-bucket".to_string(),
                source_ip: "192.168.1.12".to_string(),
                device_id: "device-laptop-001".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        // Rejected before the pipeline: nothing was audited.
        assert!(state.monitor.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_and_events_reflect_handled_requests() {
        let state = test_state();
        evaluate_access(
            State(state.clone()),
            Json(AccessRequestBody {
                user: "eve".to_string(),
                action: "s3:ListBucket".to_string(),
                resource: "arn:aws:s3:::secure-bucket".to_string(),
                source_ip: "8.8.8.8".to_string(),
                device_id: "device-laptop-001".to_string(),
            }),
        )
        .await
        .unwrap();

        let metrics = metrics_snapshot(State(state.clone())).await;
        assert_eq!(metrics.0.total_access_requests, 1);
        assert_eq!(metrics.0.deny_count, 1);
        assert_eq!(metrics.0.total_remediations, 1);

        let events = list_events(State(state.clone()), Query(EventsQuery { limit: Some(1) }))
            .await
            .unwrap();
        assert_eq!(events.0.len(), 1);

        let health = health_check(State(state)).await;
        assert_eq!(health.0.status, "healthy");
        assert!(!health.0.audit_alarm);
    }

    #[tokio::test]
    async fn reload_without_a_source_is_an_internal_error() {
        let state = test_state();
        let err = reload_policies(State(state)).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
