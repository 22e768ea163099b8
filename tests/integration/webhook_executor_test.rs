// The webhook executor against a local stand-in for the automation engine.

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpResponse, HttpServer};
use helpers::*;
use paylab::core::AppError;
use paylab::modules::runs::models::{RunStep, StepStatus};
use paylab::modules::runs::services::{ScenarioExecutor, StepRouter, WebhookExecutor};
use paylab::modules::scenarios::Scenario;
use paylab::modules::wizard::models::StartPayload;
use paylab::modules::wizard::services::WizardState;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CALLBACK_BASE: &str = "http://paylab.test/";

/// Launch requests the stub engine received
#[derive(Default)]
struct EngineLog {
    requests: Mutex<Vec<Value>>,
}

impl EngineLog {
    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn accept_with_ack(body: web::Json<Value>, log: web::Data<EngineLog>) -> HttpResponse {
    log.requests.lock().unwrap().push(body.into_inner());
    HttpResponse::Ok().json(json!({
        "baseUrl": "http://engine.test",
        "launchUrl": "http://engine.test/runs/42"
    }))
}

async fn accept_silently(body: web::Json<Value>, log: web::Data<EngineLog>) -> HttpResponse {
    log.requests.lock().unwrap().push(body.into_inner());
    HttpResponse::Ok().finish()
}

async fn unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().body("engine in maintenance")
}

struct Engine {
    base_url: String,
    log: web::Data<EngineLog>,
    handle: ServerHandle,
}

impl Engine {
    fn start() -> Engine {
        let log = web::Data::new(EngineLog::default());
        let app_log = log.clone();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_log.clone())
                .route("/ack", web::post().to(accept_with_ack))
                .route("/empty", web::post().to(accept_silently))
                .route("/down", web::post().to(unavailable))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Engine {
            base_url: format!("http://{}", addr),
            log,
            handle,
        }
    }

    fn executor(&self, path: &str, router: &StepRouter) -> WebhookExecutor {
        WebhookExecutor::new(
            format!("{}{}", self.base_url, path),
            CALLBACK_BASE,
            Duration::from_secs(5),
            router.clone(),
        )
        .unwrap()
    }

    async fn stop(self) {
        self.handle.stop(true).await;
    }
}

fn ready_payload() -> StartPayload {
    let (mut wizard, _) = wizard_with(Arc::new(ScriptedExecutor::default()));
    fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);
    wizard.payload().cloned().unwrap()
}

#[actix_web::test]
async fn test_accepted_launch_maps_ack_and_routes_steps() {
    let engine = Engine::start();
    let router = StepRouter::default();
    let executor = engine.executor("/ack", &router);
    let payload = ready_payload();

    let mut launch = executor.launch("run-ack", &payload).await.unwrap();

    assert_eq!(launch.context.base_url.as_deref(), Some("http://engine.test"));
    assert_eq!(
        launch.context.launch_url.as_deref(),
        Some("http://engine.test/runs/42")
    );

    let requests = engine.log.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["runKey"], "run-ack");
    assert_eq!(
        requests[0]["callbackUrl"],
        "http://paylab.test/api/runs/run-ack/steps"
    );
    let sent: StartPayload = serde_json::from_value(requests[0]["payload"].clone()).unwrap();
    assert_eq!(sent, payload);

    assert!(router.is_registered("run-ack").await);
    router
        .dispatch("run-ack", RunStep::new(1, "create payment", StepStatus::Running))
        .await
        .unwrap();
    assert_eq!(launch.steps.recv().await.unwrap().name, "create payment");

    engine.stop().await;
}

#[actix_web::test]
async fn test_empty_ack_falls_back_to_webhook_url() {
    let engine = Engine::start();
    let router = StepRouter::default();
    let executor = engine.executor("/empty", &router);

    let launch = executor.launch("run-empty", &ready_payload()).await.unwrap();

    assert!(launch.context.base_url.is_none());
    assert_eq!(
        launch.context.launch_url,
        Some(format!("{}/empty", engine.base_url))
    );
    assert_eq!(engine.log.requests().len(), 1);
    assert!(router.is_registered("run-empty").await);

    engine.stop().await;
}

#[actix_web::test]
async fn test_rejected_launch_releases_route() {
    let engine = Engine::start();
    let router = StepRouter::default();
    let executor = engine.executor("/down", &router);

    let err = executor
        .launch("run-down", &ready_payload())
        .await
        .err()
        .unwrap();

    assert!(matches!(&err, AppError::Execution(msg) if msg.contains("503")));
    assert!(err.to_string().contains("engine in maintenance"));
    assert!(!router.is_registered("run-down").await);
    assert_eq!(router.active_routes().await, 0);

    engine.stop().await;
}

#[actix_web::test]
async fn test_wizard_records_rejected_launch() {
    let engine = Engine::start();
    let router = StepRouter::default();
    let (mut wizard, store) = wizard_with(Arc::new(engine.executor("/down", &router)));
    fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);

    let err = wizard.submit().await.err().unwrap();

    assert!(matches!(err, AppError::Execution(_)));
    assert_eq!(wizard.state(), WizardState::Failed);
    assert_eq!(router.active_routes().await, 0);

    let history = store.load_all().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].run.steps[0].name, "launch");

    engine.stop().await;
}

#[actix_web::test]
async fn test_abandon_closes_stream() {
    let engine = Engine::start();
    let router = StepRouter::default();
    let executor = engine.executor("/ack", &router);

    let mut launch = executor.launch("run-gone", &ready_payload()).await.unwrap();
    executor.abandon("run-gone").await;

    assert!(!router.is_registered("run-gone").await);
    assert!(launch.steps.recv().await.is_none());

    engine.stop().await;
}
