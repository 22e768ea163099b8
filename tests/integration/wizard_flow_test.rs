#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::*;
use paylab::core::AppError;
use paylab::modules::runs::models::{IgnoreReason, RunStatus, RunStep, StepOutcome, StepStatus};
use paylab::modules::runs::repositories::{MemoryStorage, RunSessionStore};
use paylab::modules::runs::services::{RateLimiterConfig, StepRouter, SubmissionRateLimiter};
use paylab::modules::scenarios::Scenario;
use paylab::modules::wizard::models::{ActionTag, CardPlan, RunMode};
use paylab::modules::wizard::services::{
    drive_run, ScenarioWizard, WizardRegistry, WizardState, STREAM_CLOSED_MESSAGE,
};
use std::sync::Arc;
use std::time::Duration;

fn running(seq: u64, name: &str) -> RunStep {
    RunStep::new(seq, name, StepStatus::Running)
}

#[tokio::test]
async fn test_error_step_wins_and_stray_steps_are_ignored() {
    let executor = Arc::new(ScriptedExecutor::new(vec![
        running(1, "create payment"),
        running(2, "send card"),
        RunStep::new(3, "bank response", StepStatus::Success),
        RunStep::new(4, "capture", StepStatus::Error).with_message("card declined by issuer"),
        RunStep::new(5, "late success", StepStatus::Success).finishing(),
    ]));
    let (mut wizard, store) = wizard_with(executor.clone());
    fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);

    let stream = wizard.submit().await.unwrap();
    let err = wizard.run_to_completion(stream).await.unwrap_err();

    assert!(matches!(&err, AppError::Execution(msg) if msg == "card declined by issuer"));
    assert_eq!(wizard.state(), WizardState::Failed);

    let stray = wizard
        .apply_step(RunStep::new(5, "late success", StepStatus::Success).finishing())
        .await;
    assert_eq!(stray, StepOutcome::Ignored(IgnoreReason::AlreadyTerminal));

    let run = wizard.run().unwrap();
    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.steps.len(), 4);
    assert!(run.end_time.is_some());

    let history = store.load_all().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].run.steps.len(), 4);
    assert_eq!(history[0].run.steps[3].status, StepStatus::Error);
}

#[tokio::test]
async fn test_cancel_without_candidate_blocks_submission() {
    let (mut wizard, _) = wizard_with(Arc::new(ScriptedExecutor::default()));
    fill_until_last_step(&mut wizard, &[Scenario::Cancel]);

    assert_eq!(wizard.advance().unwrap(), WizardState::CollectingActionDetail);
    wizard
        .update_draft(TestDataFactory::action_detail(None))
        .unwrap();

    let err = wizard.advance().unwrap_err();
    assert!(err
        .validation_errors()
        .unwrap()
        .contains("cancelRefund.candidate"));
    assert_eq!(wizard.state(), WizardState::CollectingActionDetail);
    assert!(wizard.payload().is_none());

    let err = wizard.submit().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(wizard.state(), WizardState::CollectingActionDetail);
}

#[tokio::test]
async fn test_refund_flow_carries_prior_payment() {
    let executor = Arc::new(ScriptedExecutor::new(vec![
        running(1, "refund"),
        RunStep::new(2, "refund approved", StepStatus::Success)
            .finishing()
            .with_response(serde_json::json!({"refundId": "RF-1"})),
    ]));
    let (mut wizard, store) = wizard_with(executor.clone());
    fill_to_ready(&mut wizard, &[Scenario::Refund]);

    let payload = wizard.payload().unwrap().clone();
    assert_eq!(payload.actions, vec![ActionTag::Refund]);
    assert_eq!(payload.run_mode, RunMode::Single);
    assert!(payload.prior_payment.is_some());
    assert!(payload.payment.is_none());

    let stream = wizard.submit().await.unwrap();
    assert_eq!(
        wizard.run_to_completion(stream).await.unwrap(),
        RunStatus::Completed
    );
    assert_eq!(
        wizard.run().unwrap().result,
        Some(serde_json::json!({"refundId": "RF-1"}))
    );
    assert_eq!(executor.last_payload().unwrap(), payload);
    assert_eq!(store.load_all().await[0].run_key, wizard.run_key().unwrap());
}

#[tokio::test]
async fn test_all_runs_sequence_without_action_detail() {
    let (mut wizard, _) = wizard_with(Arc::new(ScriptedExecutor::default()));
    fill_until_last_step(&mut wizard, &[Scenario::Cancel, Scenario::All]);

    assert_eq!(wizard.advance().unwrap(), WizardState::ReadyToSubmit);
    let payload = wizard.payload().unwrap();
    assert_eq!(payload.run_mode, RunMode::Sequence);
    assert_eq!(
        payload.actions,
        vec![ActionTag::Payment, ActionTag::Cancel, ActionTag::Refund]
    );
    assert_eq!(payload.cards, Some(CardPlan::Automatic { count: 2 }));
}

#[tokio::test]
async fn test_second_submit_while_running_rejected() {
    let executor = ChannelExecutor::default();
    let (mut wizard, _) = wizard_with(Arc::new(executor.clone()));
    fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);

    let _stream = wizard.submit().await.unwrap();
    assert_eq!(wizard.state(), WizardState::Running);

    assert!(matches!(
        wizard.submit().await.unwrap_err(),
        AppError::InvalidTransition(_)
    ));
    assert!(matches!(
        wizard.advance().unwrap_err(),
        AppError::InvalidTransition(_)
    ));
}

#[tokio::test]
async fn test_launch_failure_is_recorded() {
    let (mut wizard, store) = wizard_with(Arc::new(FailingExecutor));
    fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);

    let err = wizard.submit().await.unwrap_err();
    assert!(matches!(err, AppError::Execution(_)));
    assert_eq!(wizard.state(), WizardState::Failed);

    let history = store.load_all().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].run.status, RunStatus::Error);
    assert_eq!(history[0].run.steps[0].name, "launch");
}

#[tokio::test]
async fn test_history_failure_does_not_fail_run() {
    let storage = Arc::new(UnavailableStorage::default());
    let store = RunSessionStore::new(storage.clone());
    let executor = Arc::new(ScriptedExecutor::new(vec![RunStep::new(
        1,
        "approved",
        StepStatus::Success,
    )
    .finishing()]));
    let mut wizard = ScenarioWizard::new(limiter(), store.clone(), executor);
    fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);

    let stream = wizard.submit().await.unwrap();
    assert_eq!(
        wizard.run_to_completion(stream).await.unwrap(),
        RunStatus::Completed
    );
    assert_eq!(storage.write_attempts(), 1);
    assert!(store.load_all().await.is_empty());
}

#[tokio::test]
async fn test_drive_run_follows_live_stream() {
    let executor = ChannelExecutor::default();
    let registry = WizardRegistry::new(
        SubmissionRateLimiter::new(RateLimiterConfig::new(Duration::from_millis(10)).unwrap()),
        RunSessionStore::new(Arc::new(MemoryStorage::new())),
        Arc::new(executor.clone()),
    );
    let (_, shared) = registry.create().await.unwrap();
    {
        let mut wizard = shared.lock().await;
        wizard.reset().await;
        fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);
    }

    let stream = shared.lock().await.submit().await.unwrap();
    let run_key = executor.run_key(0);
    let task = tokio::spawn(drive_run(shared.clone(), run_key, stream));

    let sender = executor.sender(0);
    sender.send(running(1, "create payment")).await.unwrap();
    sender.send(running(2, "await bank")).await.unwrap();
    drop(sender);
    executor.close_all();

    task.await.unwrap();

    let wizard = shared.lock().await;
    assert_eq!(wizard.state(), WizardState::Failed);
    let run = wizard.run().unwrap();
    assert_eq!(run.steps.len(), 3);
    assert_eq!(run.steps[2].message.as_deref(), Some(STREAM_CLOSED_MESSAGE));
    assert_eq!(registry.store().load_all().await.len(), 1);
}

#[tokio::test]
async fn test_reset_stops_observing_run() {
    let executor = ChannelExecutor::default();
    let (wizard, store) = wizard_with(Arc::new(executor.clone()));
    let shared = Arc::new(tokio::sync::Mutex::new(wizard));
    fill_to_ready(&mut *shared.lock().await, &[Scenario::Payment3dsOff]);

    let stream = shared.lock().await.submit().await.unwrap();
    let task = tokio::spawn(drive_run(shared.clone(), executor.run_key(0), stream));

    shared.lock().await.reset().await;
    executor
        .sender(0)
        .send(RunStep::new(1, "approved", StepStatus::Success).finishing())
        .await
        .unwrap();
    task.await.unwrap();

    assert_eq!(shared.lock().await.state(), WizardState::Idle);
    assert!(store.load_all().await.is_empty());
}

fn routed_registry(router: &StepRouter) -> WizardRegistry {
    WizardRegistry::new(
        SubmissionRateLimiter::new(RateLimiterConfig::new(Duration::from_millis(10)).unwrap()),
        RunSessionStore::new(Arc::new(MemoryStorage::new())),
        Arc::new(RoutedExecutor::new(router.clone())),
    )
}

#[tokio::test]
async fn test_reset_releases_route_of_silent_run() {
    let router = StepRouter::default();
    let registry = routed_registry(&router);
    let (_, shared) = registry.create().await.unwrap();
    {
        let mut wizard = shared.lock().await;
        wizard.reset().await;
        fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);
    }

    let stream = shared.lock().await.submit().await.unwrap();
    let run_key = shared.lock().await.run_key().unwrap().to_string();
    let task = tokio::spawn(drive_run(shared.clone(), run_key.clone(), stream));
    assert!(router.is_registered(&run_key).await);

    // The engine never reports; abandoning must still end the observer
    shared.lock().await.reset().await;

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("observer should finish once the route is released")
        .unwrap();
    assert!(!router.is_registered(&run_key).await);
    assert_eq!(router.active_routes().await, 0);
    assert_eq!(shared.lock().await.state(), WizardState::Idle);
    assert!(registry.store().load_all().await.is_empty());
}

#[tokio::test]
async fn test_closing_session_releases_route() {
    let router = StepRouter::default();
    let registry = routed_registry(&router);
    let (id, shared) = registry.create().await.unwrap();
    {
        let mut wizard = shared.lock().await;
        wizard.reset().await;
        fill_to_ready(&mut wizard, &[Scenario::Payment3dsOff]);
    }

    let stream = shared.lock().await.submit().await.unwrap();
    let run_key = shared.lock().await.run_key().unwrap().to_string();
    let task = tokio::spawn(drive_run(shared.clone(), run_key.clone(), stream));

    registry.close(id).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("observer should finish once the session closes")
        .unwrap();
    assert!(!router.is_registered(&run_key).await);
    assert!(registry.is_empty().await);
    assert!(matches!(registry.get(id).await, Err(AppError::NotFound(_))));
}
