use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::modules::runs::repositories::RunSessionStore;
use crate::modules::runs::services::StepRouter;

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub storage: String,
    pub application: String,
}

/// Readiness probe response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
    pub storage_backend: String,
    pub active_runs: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessChecks {
    pub storage: bool,
    pub application: bool,
}

/// GET /health - Liveness probe
/// Does not check dependencies
pub async fn health_check() -> impl Responder {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: HealthChecks {
            storage: "not_checked".to_string(),
            application: "healthy".to_string(),
        },
    };

    HttpResponse::Ok().json(response)
}

/// GET /ready - Readiness probe
/// Checks that the run history backend is reachable
pub async fn readiness_check(
    store: web::Data<RunSessionStore>,
    router: web::Data<StepRouter>,
) -> impl Responder {
    let mut ready = true;
    let mut checks = ReadinessChecks {
        storage: false,
        application: true,
    };

    match store.check().await {
        Ok(()) => {
            checks.storage = true;
        }
        Err(e) => {
            ready = false;
            tracing::error!(backend = store.backend(), "Storage readiness check failed: {}", e);
        }
    }

    let response = ReadinessResponse {
        ready,
        checks,
        storage_backend: store.backend().to_string(),
        active_runs: router.active_routes().await,
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
