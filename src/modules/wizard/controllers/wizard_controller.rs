use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{AppError, ValidationErrors};
use crate::modules::scenarios::Scenario;
use crate::modules::wizard::models::DraftUpdate;
use crate::modules::wizard::services::{drive_run, WizardRegistry};

/// Response for a newly opened session
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub state: String,
}

/// Rate limiter view used by the UI to enable the submit button
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub can_proceed: bool,
    pub remaining_wait_ms: u64,
    pub active_requests: usize,
}

/// Open a new wizard session
/// POST /api/wizard/sessions
pub async fn create_session(
    registry: web::Data<WizardRegistry>,
) -> Result<HttpResponse, AppError> {
    let (session_id, wizard) = registry.create().await?;
    let state = wizard.lock().await.state();

    Ok(HttpResponse::Created().json(SessionCreated {
        session_id,
        state: serde_json::to_value(state)?
            .as_str()
            .unwrap_or_default()
            .to_string(),
    }))
}

/// GET /api/wizard/sessions/{id}
pub async fn get_session(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let wizard = registry.get(path.into_inner()).await?;
    let snapshot = wizard.lock().await.snapshot();
    Ok(HttpResponse::Ok().json(snapshot))
}

/// DELETE /api/wizard/sessions/{id}
pub async fn close_session(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    registry.close(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Toggle one scenario in the selection
/// POST /api/wizard/sessions/{id}/scenarios/{scenario}/toggle
pub async fn toggle_scenario(
    registry: web::Data<WizardRegistry>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, AppError> {
    let (id, raw) = path.into_inner();
    let scenario: Scenario = raw.parse().map_err(|msg: String| {
        let mut errors = ValidationErrors::new();
        errors.push("scenario", msg);
        AppError::Validation(errors)
    })?;

    let wizard = registry.get(id).await?;
    let mut wizard = wizard.lock().await;
    wizard.toggle_scenario(scenario)?;
    Ok(HttpResponse::Ok().json(wizard.snapshot()))
}

/// Update the draft fields of one wizard step
/// PUT /api/wizard/sessions/{id}/draft
pub async fn update_draft(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
    update: web::Json<DraftUpdate>,
) -> Result<HttpResponse, AppError> {
    let wizard = registry.get(path.into_inner()).await?;
    let mut wizard = wizard.lock().await;
    wizard.update_draft(update.into_inner())?;
    Ok(HttpResponse::Ok().json(wizard.snapshot()))
}

/// POST /api/wizard/sessions/{id}/advance
pub async fn advance(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let wizard = registry.get(path.into_inner()).await?;
    let mut wizard = wizard.lock().await;
    wizard.advance()?;
    Ok(HttpResponse::Ok().json(wizard.snapshot()))
}

/// POST /api/wizard/sessions/{id}/back
pub async fn back(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let wizard = registry.get(path.into_inner()).await?;
    let mut wizard = wizard.lock().await;
    wizard.back()?;
    Ok(HttpResponse::Ok().json(wizard.snapshot()))
}

/// Launch the prepared run
/// POST /api/wizard/sessions/{id}/submit
///
/// The session is not locked while the engine answers the launch; it reads
/// as `launching` meanwhile. Steps are consumed in the background; poll the
/// session to follow them.
pub async fn submit(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();
    let shared = registry.get(session_id).await?;

    let pending = shared.lock().await.begin_submit()?;
    let run_key = pending.run_key().to_string();
    let attempt = pending.launch().await;

    let mut wizard = shared.lock().await;
    let steps = wizard.finish_submit(attempt).await?;
    let snapshot = wizard.snapshot();
    drop(wizard);

    tracing::info!(session_id = %session_id, run_key = %run_key, "Observing run");
    tokio::spawn(drive_run(shared, run_key, steps));

    Ok(HttpResponse::Accepted().json(snapshot))
}

/// POST /api/wizard/sessions/{id}/reset
pub async fn reset(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let wizard = registry.get(path.into_inner()).await?;
    let mut wizard = wizard.lock().await;
    wizard.reset().await;
    wizard.open()?;
    Ok(HttpResponse::Ok().json(wizard.snapshot()))
}

/// GET /api/wizard/sessions/{id}/rate-limit
pub async fn rate_limit_status(
    registry: web::Data<WizardRegistry>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    // Confirms the session exists; the limiter itself is shared
    registry.get(path.into_inner()).await?;
    let limiter = registry.limiter();

    Ok(HttpResponse::Ok().json(RateLimitStatus {
        can_proceed: limiter.can_proceed(),
        remaining_wait_ms: limiter.remaining_wait_time().as_millis() as u64,
        active_requests: limiter.active_requests(),
    }))
}

/// Configure wizard routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/wizard/sessions")
            .route("", web::post().to(create_session))
            .route("/{id}", web::get().to(get_session))
            .route("/{id}", web::delete().to(close_session))
            .route(
                "/{id}/scenarios/{scenario}/toggle",
                web::post().to(toggle_scenario),
            )
            .route("/{id}/draft", web::put().to(update_draft))
            .route("/{id}/advance", web::post().to(advance))
            .route("/{id}/back", web::post().to(back))
            .route("/{id}/submit", web::post().to(submit))
            .route("/{id}/reset", web::post().to(reset))
            .route("/{id}/rate-limit", web::get().to(rate_limit_status)),
    );
}
