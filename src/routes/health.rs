/**
 * Health Routes
 * Liveness ping and a readiness check against the admin data gateway
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::site_config::CachePhase;
use crate::AppState;

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Initialize the server start time
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Single dependency check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceCheck {
    fn healthy(response_time: Option<u64>) -> Self {
        Self {
            status: "healthy".to_string(),
            response_time,
            error: None,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            response_time: None,
            error: Some(error.into()),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyChecks {
    pub gateway: ServiceCheck,
    pub store: ServiceCheck,
    pub site_config: String,
}

/// Ready check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub checks: ReadyChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

fn phase_label(phase: CachePhase) -> &'static str {
    match phase {
        CachePhase::Uninitialized => "cold",
        CachePhase::Loading => "loading",
        CachePhase::Ready => "cached",
    }
}

/// GET /health - Simple health ping
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/ready - 200 when the gateway is connected and the store
/// answers, 503 otherwise
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();

    let (gateway, store) = match state.gateway.store() {
        Ok(store) => {
            let started = Instant::now();
            let check = match store.ping().await {
                Ok(()) => ServiceCheck::healthy(Some(started.elapsed().as_millis() as u64)),
                Err(e) => {
                    tracing::warn!("Store ping failed: {}", e);
                    ServiceCheck::unhealthy(e.to_string())
                }
            };
            (ServiceCheck::healthy(None), check)
        }
        Err(e) => (
            ServiceCheck::unhealthy(e.to_string()),
            ServiceCheck::unhealthy("Gateway not connected"),
        ),
    };

    let is_ready = gateway.is_healthy() && store.is_healthy();
    let reason = if is_ready {
        None
    } else if !gateway.is_healthy() {
        Some("Admin data gateway is not configured".to_string())
    } else {
        Some("Document store is not reachable".to_string())
    };

    let response = ReadyResponse {
        status: if is_ready { "ready" } else { "not ready" }.to_string(),
        timestamp: Utc::now(),
        uptime,
        checks: ReadyChecks {
            gateway,
            store,
            site_config: phase_label(state.site_config.phase()).to_string(),
        },
        reason,
    };

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
