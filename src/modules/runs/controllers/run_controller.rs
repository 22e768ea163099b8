use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::{AppError, Result};
use crate::modules::runs::models::{RunStep, SavedRun};
use crate::modules::runs::repositories::RunSessionStore;
use crate::modules::runs::services::{CallbackSigner, StepRouter, SIGNATURE_HEADER};

/// Run history and the automation engine's step callbacks
///
/// - `GET /api/runs/history`: the most recent saved runs
/// - `POST /api/runs/{run_key}/steps`: signed step updates for a live run
pub struct RunController {
    store: RunSessionStore,
    router: StepRouter,
    signer: CallbackSigner,
}

impl RunController {
    pub fn new(store: RunSessionStore, router: StepRouter, signer: CallbackSigner) -> Self {
        Self {
            store,
            router,
            signer,
        }
    }

    /// Configure run routes
    pub fn configure(cfg: &mut web::ServiceConfig, controller: RunController) {
        cfg.service(
            web::scope("/api/runs")
                .app_data(web::Data::new(controller))
                .service(run_history)
                .service(receive_step),
        );
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHistoryResponse {
    pub runs: Vec<SavedRun>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAccepted {
    pub run_key: String,
    pub seq: u64,
}

/// Most recent runs first
#[get("/history")]
async fn run_history(controller: web::Data<RunController>) -> Result<HttpResponse> {
    let runs = controller.store.load_all().await;
    Ok(HttpResponse::Ok().json(RunHistoryResponse { runs }))
}

/// Accept one step callback from the automation engine
///
/// The raw body must be signed with the shared secret in `X-Signature`.
#[post("/{run_key}/steps")]
async fn receive_step(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    controller: web::Data<RunController>,
) -> Result<HttpResponse> {
    let run_key = path.into_inner();

    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing X-Signature header"))?;

    if !controller.signer.verify(&body, signature) {
        warn!(run_key = %run_key, "Rejected step callback with bad signature");
        return Err(AppError::unauthorized("Invalid step callback signature"));
    }

    let step: RunStep = serde_json::from_slice(&body)?;
    let seq = step.seq;

    info!(
        run_key = %run_key,
        seq,
        name = %step.name,
        status = %step.status,
        "Received step callback"
    );

    controller.router.dispatch(&run_key, step).await?;

    Ok(HttpResponse::Accepted().json(StepAccepted { run_key, seq }))
}
