//! HTTP boundary
//!
//! - POST   /api/incidents              ingest a detection (held until resolved)
//! - POST   /api/decisions              operator confirm / reject
//! - GET    /api/nodes                  list nodes (sweeps liveness first)
//! - POST   /api/nodes                  register a node
//! - GET    /api/nodes/:id              one node
//! - DELETE /api/nodes/:id              deregister
//! - POST   /api/nodes/:id/heartbeat    liveness signal
//! - POST   /api/external/reports       inbound report from the cooperating system
//! - GET    /health

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use laneguard_core::{
    DecisionSubmission, Heartbeat, IncidentReport, LaneguardError, Node, NodeId, ReportedStatus,
};

use crate::{ExternalReport, Orchestrator};

type SharedOrchestrator = Arc<Orchestrator>;

/// Errors leaving the HTTP boundary
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] LaneguardError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e {
                LaneguardError::Validation(_) => StatusCode::BAD_REQUEST,
                LaneguardError::NotFound { .. } => StatusCode::NOT_FOUND,
                LaneguardError::AlreadyExists { .. }
                | LaneguardError::DuplicatePending(_)
                | LaneguardError::DuplicateResolution(_) => StatusCode::CONFLICT,
                LaneguardError::ExternalNotify(_) => StatusCode::BAD_GATEWAY,
                LaneguardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                LaneguardError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Core(e) => match e {
                LaneguardError::Validation(_) => "validation",
                LaneguardError::NotFound { .. } => "not_found",
                LaneguardError::AlreadyExists { .. } => "already_exists",
                LaneguardError::DuplicatePending(_) => "duplicate_pending",
                LaneguardError::DuplicateResolution(_) => "duplicate_resolution",
                LaneguardError::ExternalNotify(_) => "external_notify",
                LaneguardError::Timeout(_) => "timeout",
                LaneguardError::Configuration(_) => "configuration",
            },
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBody {
    pub status: ReportedStatus,
    /// Sender clock; arrival time when omitted
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

pub fn router(orchestrator: SharedOrchestrator) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/incidents", post(ingest_incident))
        .route("/api/decisions", post(submit_decision))
        .route("/api/nodes", get(list_nodes).post(register_node))
        .route("/api/nodes/:id", get(get_node).delete(deregister_node))
        .route("/api/nodes/:id/heartbeat", post(heartbeat))
        .route("/api/external/reports", post(external_report))
        .with_state(orchestrator)
}

async fn health(State(orch): State<SharedOrchestrator>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pendingDecisions": orch.coordinator().pending_count(),
        "nodes": orch.nodes().node_count(),
    }))
}

async fn ingest_incident(
    State(orch): State<SharedOrchestrator>,
    Json(report): Json<IncidentReport>,
) -> ApiResult<impl IntoResponse> {
    // own task: a client hanging up must not abandon the incident
    let outcome = tokio::spawn(async move { orch.ingest(report).await })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(outcome))
}

async fn submit_decision(
    State(orch): State<SharedOrchestrator>,
    Json(submission): Json<DecisionSubmission>,
) -> ApiResult<impl IntoResponse> {
    let incident_id = submission.incident_id.clone();
    // late or unknown decisions are acknowledged, not surfaced as errors
    let accepted = match orch.submit_decision(submission) {
        Ok(()) => true,
        Err(LaneguardError::DuplicateResolution(_)) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(Json(json!({ "incidentId": incident_id, "accepted": accepted })))
}

async fn list_nodes(State(orch): State<SharedOrchestrator>) -> impl IntoResponse {
    Json(orch.list_nodes())
}

async fn register_node(
    State(orch): State<SharedOrchestrator>,
    Json(node): Json<Node>,
) -> ApiResult<impl IntoResponse> {
    let node = orch.register_node(node)?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(orch): State<SharedOrchestrator>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(orch.get_node(&NodeId::new(id))?))
}

async fn deregister_node(
    State(orch): State<SharedOrchestrator>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    orch.deregister_node(&NodeId::new(id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn heartbeat(
    State(orch): State<SharedOrchestrator>,
    Path(id): Path<String>,
    Json(body): Json<HeartbeatBody>,
) -> ApiResult<impl IntoResponse> {
    let heartbeat = Heartbeat {
        node_id: NodeId::new(id),
        status: body.status,
        timestamp: body.timestamp.unwrap_or_else(Utc::now),
    };
    let outcome = orch.heartbeat(&heartbeat)?;
    Ok(Json(json!({
        "nodeId": outcome.node.id,
        "status": outcome.node.status,
        "applied": outcome.applied,
    })))
}

async fn external_report(
    State(orch): State<SharedOrchestrator>,
    Json(report): Json<ExternalReport>,
) -> ApiResult<impl IntoResponse> {
    let outcome = orch.relay_external_report(report)?;
    Ok(Json(json!({ "outcome": outcome })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DisabledNotifier, RuntimeConfig};
    use axum::body::Body;
    use axum::http::Request;
    use laneguard_core::IncidentId;
    use tower::ServiceExt;

    fn app() -> Router {
        let orch = Orchestrator::new(&RuntimeConfig::default(), Arc::new(DisabledNotifier));
        router(Arc::new(orch))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LaneguardError::validation("x"), StatusCode::BAD_REQUEST),
            (LaneguardError::node_not_found("N1"), StatusCode::NOT_FOUND),
            (LaneguardError::node_exists("N1"), StatusCode::CONFLICT),
            (LaneguardError::DuplicatePending(IncidentId::new("i")), StatusCode::CONFLICT),
            (LaneguardError::ExternalNotify("x".into()), StatusCode::BAD_GATEWAY),
            (LaneguardError::Timeout(IncidentId::new("i")), StatusCode::GATEWAY_TIMEOUT),
            (LaneguardError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pendingDecisions"], 0);
    }

    #[tokio::test]
    async fn test_node_lifecycle() {
        let app = app();
        let (status, _) = call(&app, "POST", "/api/nodes", json!({"id": "N1", "speedLimit": 100})).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&app, "POST", "/api/nodes", json!({"id": "N1", "speedLimit": 100})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already_exists");

        let (status, body) = call(&app, "POST", "/api/nodes/N1/heartbeat", json!({"status": "online"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ONLINE");

        let (_, body) = call(&app, "GET", "/api/nodes", serde_json::Value::Null).await;
        assert_eq!(body[0]["id"], "N1");
        assert_eq!(body[0]["status"], "ONLINE");

        let (status, _) = call(&app, "DELETE", "/api/nodes/N1", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&app, "GET", "/api/nodes/N1", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_ingest_for_unknown_node_is_404() {
        let (status, body) = call(
            &app(),
            "POST",
            "/api/incidents",
            json!({"coordinates": {"lat": 37.5, "lng": 127.0}, "laneNumber": 1, "nodeId": "ghost", "mediaRefs": []}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_ingest_missing_coordinates_is_400() {
        let (status, body) = call(
            &app(),
            "POST",
            "/api/incidents",
            json!({"laneNumber": 1, "nodeId": "N1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn test_decision_for_unknown_incident_is_acknowledged() {
        let (status, body) = call(
            &app(),
            "POST",
            "/api/decisions",
            json!({"incidentId": "nope", "nodeId": "N1", "status": "CONFIRMED", "actions": []}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], false);
    }

    #[tokio::test]
    async fn test_external_report_relay_then_suppress() {
        let app = app();
        let report = json!({"accidentId": "hub-1", "location": {"lat": 35.1, "lng": 129.0}});

        let (_, body) = call(&app, "POST", "/api/external/reports", report.clone()).await;
        assert_eq!(body["outcome"], "relayed");
        let (_, body) = call(&app, "POST", "/api/external/reports", report).await;
        assert_eq!(body["outcome"], "suppressed");
    }
}
