mod support;

use std::sync::Arc;

use surveil_core::portal::{
    MonitorError, MonitorEvent, MonitorStatus, RunControlState, Supervisor, UiSignal,
};

use support::{credentials, harness, has_line, wait_until, wrong_credentials, MockPortal};

fn idle_state() -> RunControlState {
    RunControlState {
        running: false,
        stopping: false,
        continue_loop: true,
    }
}

fn ends_with_unlock_and_stopped(events: &[MonitorEvent]) -> bool {
    matches!(
        events,
        [
            ..,
            MonitorEvent::Control(UiSignal::Unlock),
            MonitorEvent::Status(MonitorStatus::Stopped)
        ]
    )
}

#[tokio::test(start_paused = true)]
async fn stop_without_a_run_does_nothing() {
    let harness = harness(MockPortal::new());
    let supervisor = Supervisor::new(harness.pipeline);

    assert!(!supervisor.stop());
    assert_eq!(supervisor.state(), idle_state());
    assert!(harness.events.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_ends_a_healthy_run() {
    let harness = harness(MockPortal::new());
    let events = harness.events.clone();
    let supervisor = Arc::new(Supervisor::new(harness.pipeline));

    let handle = Arc::clone(&supervisor).spawn(credentials());
    wait_until(|| events.messages().len() >= 3).await;
    assert!(supervisor.is_running());
    assert!(supervisor.stop());
    assert!(!supervisor.stop(), "second stop while stopping is ignored");

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome, Some(MonitorError::Cancelled)));
    assert_eq!(supervisor.state(), idle_state());
    assert!(has_line(&events, "[INFO] supervisor => stop signal sent"));
    assert!(ends_with_unlock_and_stopped(&events.events()));
    assert_eq!(harness.portal.launches(), 1);
    assert_eq!(harness.portal.browsers_closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_relaunches_browser_and_page() {
    let harness = harness(MockPortal::new().failing_redirects(1));
    let events = harness.events.clone();
    let supervisor = Arc::new(Supervisor::new(harness.pipeline));

    let handle = Arc::clone(&supervisor).spawn(credentials());
    wait_until(|| !events.messages().is_empty()).await;
    supervisor.stop();
    let outcome = handle.await.unwrap();

    assert!(matches!(outcome, Some(MonitorError::Cancelled)));
    assert_eq!(harness.portal.launches(), 2);
    assert_eq!(harness.portal.pages_opened(), 2);
    assert_eq!(harness.portal.browsers_closed(), 2);
    assert!(has_line(&events, "[INFO] supervisor => cleanup complete, restarting"));
}

#[tokio::test(start_paused = true)]
async fn launch_crashes_are_retried() {
    let harness = harness(MockPortal::new().failing_launches(2));
    let events = harness.events.clone();
    let supervisor = Arc::new(Supervisor::new(harness.pipeline));

    let handle = Arc::clone(&supervisor).spawn(credentials());
    wait_until(|| !events.messages().is_empty()).await;
    supervisor.stop();
    handle.await.unwrap();

    assert_eq!(harness.portal.launches(), 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_credentials_end_supervision_without_retry() {
    let harness = harness(MockPortal::new());
    let supervisor = Supervisor::new(harness.pipeline);

    let outcome = supervisor.start(&wrong_credentials()).await;

    assert!(matches!(
        outcome,
        Some(MonitorError::InvalidCredentials { .. })
    ));
    assert_eq!(harness.portal.launches(), 1);
    assert_eq!(supervisor.state(), idle_state());
    assert!(!has_line(&harness.events, "restarting"));
    let events = harness.events.events();
    assert!(events
        .iter()
        .any(|event| matches!(event, MonitorEvent::Options(UiSignal::Lock))));
    assert!(ends_with_unlock_and_stopped(&events));
}

#[tokio::test(start_paused = true)]
async fn missing_browser_ends_supervision() {
    let harness = harness(MockPortal::new().without_executable());
    let supervisor = Supervisor::new(harness.pipeline);

    let outcome = supervisor.start(&credentials()).await;

    assert!(matches!(outcome, Some(MonitorError::BrowserUnavailable(_))));
    assert_eq!(harness.portal.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_ignored_and_restart_works_after_stop() {
    let harness = harness(MockPortal::new());
    let events = harness.events.clone();
    let supervisor = Arc::new(Supervisor::new(harness.pipeline));

    let first = Arc::clone(&supervisor).spawn(credentials());
    wait_until(|| supervisor.is_running()).await;
    assert!(supervisor.start(&credentials()).await.is_none());

    wait_until(|| !events.messages().is_empty()).await;
    supervisor.stop();
    first.await.unwrap();

    let seen = events.messages().len();
    let second = Arc::clone(&supervisor).spawn(credentials());
    wait_until(|| events.messages().len() > seen).await;
    supervisor.stop();
    let outcome = second.await.unwrap();

    assert!(matches!(outcome, Some(MonitorError::Cancelled)));
    assert_eq!(harness.portal.launches(), 2);
}
