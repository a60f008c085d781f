//! Poll scheduler tests
//! Run on paused tokio time so intervals elapse instantly and deterministically

mod common;

use common::{actions_with, drain, FakeService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use threadline_core::actions::POLL_ERROR_MESSAGE;
use threadline_core::models::NotesData;
use threadline_core::utils::{FlashLevel, UiEvent};
use threadline_core::{
    NotesActions, PageVisibility, PollConfig, PollController, PollState, Visibility,
};
use tokio::time::{sleep, Instant};

const INTERVAL: Duration = Duration::from_secs(60);

async fn polling_actions(service: Arc<FakeService>) -> NotesActions {
    let actions = actions_with(service)
        .with_poller(Arc::new(PollController::new(PollConfig { interval: INTERVAL })));
    actions
        .set_notes_data(NotesData {
            notes_path: "/issues/1/notes".to_string(),
            ..Default::default()
        })
        .await;
    actions
}

#[tokio::test(start_paused = true)]
async fn test_visible_start_requests_immediately_then_on_interval() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    assert_eq!(service.poll_count(), 1);

    sleep(INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(service.poll_count(), 1);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(service.poll_count(), 2);

    // Each request reads the cursor the previous response stored
    let requests = service.poll_requests.lock().unwrap().clone();
    assert_eq!(requests[0].endpoint, "/issues/1/notes");
    assert_eq!(requests[0].last_fetched_at, None);
    assert_eq!(requests[1].last_fetched_at, Some(1000));
}

#[tokio::test(start_paused = true)]
async fn test_hidden_then_visible_issues_one_immediate_request() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    assert_eq!(service.poll_count(), 1);

    page.hide();
    state.wait_for(|s| *s == PollState::Stopped).await.unwrap();

    // Nothing is scheduled while hidden
    sleep(INTERVAL * 10).await;
    assert_eq!(service.poll_count(), 1);

    let shown_at = Instant::now();
    page.show();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    assert_eq!(service.poll_count(), 2);
    assert!(Instant::now() - shown_at < Duration::from_secs(1));

    // Periodic scheduling resumes, with a single loop
    sleep(INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(service.poll_count(), 2);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(service.poll_count(), 3);
    sleep(INTERVAL).await;
    assert_eq!(service.poll_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_visibility_notifications_do_not_duplicate_requests() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();

    page.show();
    page.show();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.poll_count(), 1);
    assert_eq!(actions.poller().state(), PollState::Scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_hide_and_show_while_scheduled_restarts_immediately() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();

    // Both transitions land before the loop looks at the channel
    page.hide();
    page.show();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.poll_count(), 2);
    assert_eq!(actions.poller().state(), PollState::Scheduled);

    // Still one loop: the next request comes a full interval later
    sleep(INTERVAL - Duration::from_secs(2)).await;
    assert_eq!(service.poll_count(), 2);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(service.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_hide_and_show_during_request_restarts_after_it() {
    let service = FakeService::new();
    service.hold_polls.store(true, Ordering::SeqCst);
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    service.poll_entered.notified().await;
    let released_at = Instant::now();
    page.hide();
    page.show();
    service.poll_release.notify_one();

    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    assert_eq!(service.poll_count(), 2);
    assert!(Instant::now() - released_at < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_show_and_hide_while_stopped_keeps_the_loop_stopped() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Hidden);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Stopped).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.poll_count(), 1);

    page.show();
    page.hide();
    sleep(INTERVAL * 3).await;
    assert_eq!(actions.poller().state(), PollState::Stopped);
    assert_eq!(service.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_start_sends_one_request_outside_the_loop() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Hidden);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Stopped).await.unwrap();

    sleep(INTERVAL * 5).await;
    assert_eq!(service.poll_count(), 1);

    page.show();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    assert_eq!(service.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);

    actions.poll(&page).await.unwrap();
    assert!(actions.poll(&page).await.is_err());
    assert!(actions.poller().is_running().await);

    actions.poller().shutdown().await;
    assert_eq!(actions.poller().state(), PollState::Finished);
    assert!(!actions.poller().is_running().await);

    // A finished controller can be started again
    actions.poll(&page).await.unwrap();
    actions.poller().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_flashes_and_keeps_scheduling() {
    let service = FakeService::new();
    service.fail_polls.store(true, Ordering::SeqCst);
    let actions = polling_actions(service.clone()).await;
    let mut events = actions.events().subscribe();
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();

    let flashes: Vec<UiEvent> = drain(&mut events);
    assert_eq!(flashes.len(), 1);
    match &flashes[0] {
        UiEvent::Flash(flash) => {
            assert_eq!(flash.message, POLL_ERROR_MESSAGE);
            assert_eq!(flash.level, FlashLevel::Alert);
        }
        other => panic!("unexpected event {:?}", other),
    }

    service.fail_polls.store(false, Ordering::SeqCst);
    sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(service.poll_count(), 2);
    assert_eq!(actions.store().snapshot().await.last_fetched_at, Some(1000));
}

#[tokio::test(start_paused = true)]
async fn test_server_interval_and_halt() {
    let service = FakeService::new();
    *service.poll_interval.lock().unwrap() = Some(5_000);
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    sleep(Duration::from_millis(5_500)).await;
    assert_eq!(service.poll_count(), 2);

    // Server asks the client to stop polling
    *service.poll_interval.lock().unwrap() = Some(-1);
    state.wait_for(|s| *s == PollState::Halted).await.unwrap();
    assert_eq!(service.poll_count(), 3);
    sleep(INTERVAL * 3).await;
    assert_eq!(service.poll_count(), 3);

    *service.poll_interval.lock().unwrap() = None;
    actions.restart_polling().await;
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    assert_eq!(service.poll_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_make_request_while_stopped_does_not_resume_scheduling() {
    let service = FakeService::new();
    let actions = polling_actions(service.clone()).await;
    let page = PageVisibility::new(Visibility::Visible);
    let mut state = actions.poller().subscribe_state();

    actions.poll(&page).await.unwrap();
    state.wait_for(|s| *s == PollState::Scheduled).await.unwrap();
    actions.stop_polling().await;
    state.wait_for(|s| *s == PollState::Stopped).await.unwrap();

    assert!(actions.poller().make_request().await);
    state.changed().await.unwrap();
    state.wait_for(|s| *s == PollState::Stopped).await.unwrap();
    assert_eq!(service.poll_count(), 2);

    sleep(INTERVAL * 3).await;
    assert_eq!(service.poll_count(), 2);
}

#[tokio::test]
async fn test_controls_without_a_loop_are_noops() {
    let controller = PollController::new(PollConfig::default());
    assert_eq!(controller.state(), PollState::Idle);
    assert!(!controller.make_request().await);
    assert!(!controller.stop().await);
    assert!(!controller.restart().await);
}
