use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paylab::config::{Config, LogFormat};
use paylab::middleware::{json_error_handler, path_error_handler, IngressRateLimiter, RequestId};
use paylab::modules::health;
use paylab::modules::runs::controllers::RunController;
use paylab::modules::runs::services::{
    CallbackSigner, ScenarioExecutor, StepRouter, SubmissionRateLimiter, WebhookExecutor,
};
use paylab::modules::wizard::{self, WizardRegistry};

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("paylab=debug,actix_web=info,{}", config.app.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting PayLab payment scenario harness");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let store = config
        .storage
        .build_store()
        .await
        .context("Failed to open run history storage")?;

    let router = StepRouter::default();
    let executor: Arc<dyn ScenarioExecutor> = Arc::new(
        WebhookExecutor::new(
            &config.automation.webhook_url,
            &config.automation.callback_base_url,
            config.automation.timeout(),
            router.clone(),
        )
        .context("Failed to build automation client")?,
    );
    let limiter = SubmissionRateLimiter::new(config.submission.limiter_config()?);
    let registry = WizardRegistry::new(limiter, store.clone(), executor);
    let signer = CallbackSigner::new(&config.automation.webhook_secret);

    tracing::info!(
        webhook = %config.automation.webhook_url,
        callbacks = %config.automation.callback_base_url,
        min_interval_ms = config.submission.min_interval_ms,
        "Automation engine configured"
    );

    // One quota for all workers
    let ingress = IngressRateLimiter::new(config.security.rate_limit_per_minute);
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let runs = RunController::new(store.clone(), router.clone(), signer.clone());
        App::new()
            .wrap(ingress.clone())
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(router.clone()))
            .configure(health::controllers::configure)
            .configure(wizard::controllers::configure)
            .configure(|cfg| RunController::configure(cfg, runs))
            .route("/", web::get().to(index))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "PayLab payment scenario harness",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
