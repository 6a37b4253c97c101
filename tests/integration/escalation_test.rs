#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use fallsentry::application::services::dispatcher::AlertDispatcher;
use fallsentry::application::services::fall_state_machine::{
    EscalationError, FallStateMachine, Rejection,
};
use fallsentry::domain::entities::fall_event::FallState;
use fallsentry::domain::ports::channel::NotificationChannel;
use fallsentry::domain::ports::store::DispatchLogStore;
use fallsentry::domain::value_objects::channel_kind::ChannelKind;
use fallsentry::domain::value_objects::trigger_source::TriggerSource;
use fallsentry::infrastructure::persistence::in_memory_store::InMemoryStore;
use fallsentry::infrastructure::persistence::sqlite_store::SqliteStore;

use crate::support::{armed_machine, contacts, countdown_settings, wait_for, ScriptedChannel};

// ---------------------------------------------------------------------------
// Countdown expiry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unanswered_countdown_alerts_every_contact_on_every_channel() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(3)));
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let hook = ScriptedChannel::healthy(ChannelKind::Webhook);
    let channels = [Arc::clone(&sms), Arc::clone(&hook)];
    let machine = armed_machine(&store, &channels, countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    assert_eq!(machine.snapshot().state, FallState::Detected);

    let event = wait_for(&machine, |e| e.outcome.is_some()).await;
    assert_eq!(event.state, FallState::Monitoring);

    let result = event.outcome.expect("dispatch result");
    assert!(result.overall_success);
    assert_eq!(result.attempts.len(), 3 * 2);
    assert_eq!(sms.sends(), 3);
    assert_eq!(hook.sends(), 3);
    assert_eq!(result.reached_contacts().len(), 3);
    let mut destinations = sms.destinations();
    destinations.sort();
    let phones: Vec<String> = contacts(3).into_iter().map(|c| c.phone).collect();
    assert_eq!(destinations, phones);

    let history = store.recent_dispatches(10).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source, TriggerSource::Manual);
}

#[tokio::test(start_paused = true)]
async fn countdown_publishes_each_remaining_second() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(1)));
    let sms = ScriptedChannel::healthy(ChannelKind::ClickSendSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(3));
    let mut rx = machine.subscribe();

    machine.simulate_trigger().expect("trigger accepted");
    let mut seen = Vec::new();
    while rx.changed().await.is_ok() {
        let event = rx.borrow_and_update().clone();
        if event.state == FallState::Detected {
            seen.push(event.remaining_secs());
        }
        if event.outcome.is_some() {
            break;
        }
    }
    seen.dedup();
    assert_eq!(seen, vec![3, 2, 1]);
    assert_eq!(sms.sends(), 1);
}

// ---------------------------------------------------------------------------
// "I'm OK"
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancel_mid_countdown_sends_nothing_and_rearms() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(2)));
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    let event = wait_for(&machine, |e| e.remaining_secs() <= 8).await;
    assert_eq!(event.state, FallState::Detected);
    assert_eq!(event.remaining_secs(), 8);

    machine.cancel().expect("cancel accepted");
    let event = machine.snapshot();
    assert_eq!(event.state, FallState::Monitoring);
    assert_eq!(event.countdown_remaining, Duration::from_secs(15));
    assert!(event.outcome.is_none());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sms.sends(), 0);
    assert!(store.recent_dispatches(10).expect("history").is_empty());

    machine.simulate_trigger().expect("next trigger accepted");
    assert_eq!(machine.snapshot().remaining_secs(), 15);
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn missing_contacts_surface_an_error_without_sending() {
    let store = Arc::new(InMemoryStore::new());
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(5));

    machine.simulate_trigger().expect("trigger accepted");
    let event = wait_for(&machine, |e| e.error.is_some()).await;

    assert_eq!(event.state, FallState::Monitoring);
    assert_eq!(event.error.as_deref(), Some("No SOS contacts configured"));
    assert!(event.outcome.is_none());
    assert_eq!(sms.sends(), 0);
    assert!(store.recent_dispatches(10).expect("history").is_empty());
}

#[tokio::test]
async fn send_now_without_contacts_returns_configuration_error() {
    let store = Arc::new(InMemoryStore::new());
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    let err = machine
        .confirm_escalate_now()
        .await
        .expect_err("no contacts");
    assert!(matches!(err, EscalationError::NoContacts));
    assert_eq!(machine.snapshot().state, FallState::Monitoring);
}

#[tokio::test]
async fn no_channels_yields_failed_dispatch_that_can_be_retried() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(1)));
    let machine = armed_machine(&store, &[], countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    let result = machine.confirm_escalate_now().await.expect("dispatch ran");
    assert!(!result.overall_success);
    assert!(result.attempts.is_empty());
    assert!(result.configuration_error.is_some());

    let event = machine.snapshot();
    assert!(event.last_dispatch_failed());
    assert!(event.error.is_some());

    let retried = machine.retry_dispatch().await.expect("retry ran");
    assert!(!retried.overall_success);
    let history = store.recent_dispatches(10).expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].source, TriggerSource::Retry);
}

// ---------------------------------------------------------------------------
// Partial failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_healthy_channel_is_enough() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(1)));
    let broken =
        ScriptedChannel::failing(ChannelKind::ClickSendSms, "Missing ClickSend credentials");
    let healthy = ScriptedChannel::healthy(ChannelKind::TwilioWhatsApp);
    let channels = [Arc::clone(&broken), Arc::clone(&healthy)];
    let machine = armed_machine(&store, &channels, countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    let result = machine.confirm_escalate_now().await.expect("dispatch ran");

    assert!(result.overall_success);
    assert_eq!(result.attempts.len(), 2);
    let failed: Vec<_> = result.attempts.iter().filter(|a| a.error.is_some()).collect();
    let delivered: Vec<_> = result.attempts.iter().filter(|a| a.error.is_none()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].channel, ChannelKind::ClickSendSms);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].success);

    assert!(matches!(
        machine.retry_dispatch().await,
        Err(EscalationError::Rejected(Rejection::NothingToRetry))
    ));
}

// ---------------------------------------------------------------------------
// Guard against double dispatch
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn second_send_during_dispatch_is_ignored() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(2)));
    let slow = ScriptedChannel::slow(ChannelKind::TwilioSms, Duration::from_secs(2));
    let machine = armed_machine(&store, &[Arc::clone(&slow)], countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    let (first, second) = tokio::join!(machine.confirm_escalate_now(), async {
        tokio::task::yield_now().await;
        machine.confirm_escalate_now().await
    });

    assert!(first.expect("first dispatch").overall_success);
    assert!(matches!(
        second,
        Err(EscalationError::Rejected(Rejection::DispatchInFlight))
    ));
    assert_eq!(slow.sends(), 2);
    assert_eq!(store.recent_dispatches(10).expect("history").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_dispatch_started_is_rejected() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(1)));
    let slow = ScriptedChannel::slow(ChannelKind::Webhook, Duration::from_secs(2));
    let machine = armed_machine(&store, &[Arc::clone(&slow)], countdown_settings(15));

    machine.simulate_trigger().expect("trigger accepted");
    let (result, cancel) = tokio::join!(machine.confirm_escalate_now(), async {
        tokio::task::yield_now().await;
        machine.cancel()
    });

    assert!(result.expect("dispatch").overall_success);
    assert_eq!(cancel, Err(Rejection::DispatchInFlight));
}

#[tokio::test(start_paused = true)]
async fn trigger_during_countdown_is_ignored() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(1)));
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(10));

    machine.simulate_trigger().expect("first trigger");
    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(machine.trigger(TriggerSource::Device), Err(Rejection::AlreadyActive));

    let event = machine.snapshot();
    assert_eq!(event.source, Some(TriggerSource::Manual));
    assert_eq!(event.remaining_secs(), 6);

    wait_for(&machine, |e| e.outcome.is_some()).await;
    assert_eq!(sms.sends(), 1);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatches_are_logged_to_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fallsentry.db");
    let sqlite = Arc::new(SqliteStore::new(path.to_str().expect("utf8")).expect("open"));

    let contacts_store = Arc::new(InMemoryStore::with_contacts(contacts(2)));
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = FallStateMachine::new(
        contacts_store,
        AlertDispatcher::default(),
        vec![sms as Arc<dyn NotificationChannel>],
        Some(Arc::clone(&sqlite) as Arc<dyn DispatchLogStore>),
        countdown_settings(15),
    );
    machine.arm_monitoring(true);
    machine.simulate_trigger().expect("trigger accepted");
    machine.confirm_escalate_now().await.expect("dispatch ran");

    let history = sqlite.recent_dispatches(5).expect("history");
    assert_eq!(history.len(), 1);
    assert!(history[0].result.overall_success);
    assert_eq!(history[0].result.attempts.len(), 2);
    assert_eq!(history[0].source, TriggerSource::Manual);
}
