#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fallsentry::application::services::device_session::{
    DeviceSessionManager, ReconnectOutcome, SessionSettings, SkipReason,
};
use fallsentry::domain::entities::device::{DiscoveredDevice, KnownDevice, SessionStatus};
use fallsentry::domain::entities::fall_event::FallState;
use fallsentry::domain::ports::device::DeviceTransport;
use fallsentry::domain::ports::store::{DevicePreferenceStore, DispatchLogStore};
use fallsentry::domain::value_objects::channel_kind::ChannelKind;
use fallsentry::domain::value_objects::trigger_source::TriggerSource;
use fallsentry::infrastructure::device::simulated::SimulatedTransport;
use fallsentry::infrastructure::persistence::in_memory_store::InMemoryStore;
use fallsentry::infrastructure::persistence::sqlite_store::SqliteStore;

use crate::support::{
    armed_machine, contacts, countdown_settings, wait_for, GatedTransport, ScriptedChannel,
};

fn manager(
    transport: &Arc<SimulatedTransport>,
    prefs: Arc<dyn DevicePreferenceStore>,
) -> Arc<DeviceSessionManager> {
    DeviceSessionManager::new(
        Arc::clone(transport) as Arc<dyn DeviceTransport>,
        prefs,
        SessionSettings::default(),
    )
}

// ---------------------------------------------------------------------------
// Auto-reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remembered_device_reconnects_without_operator() {
    let store = Arc::new(InMemoryStore::new());
    store
        .set_last_known_device(&KnownDevice {
            id: "X".into(),
            name: Some("SmartStep".into()),
        })
        .expect("save device");
    store.set_auto_connect_enabled(true).expect("save pref");

    let transport = Arc::new(SimulatedTransport::new());
    transport.authorize(DiscoveredDevice::new("X", Some("SmartStep")));

    let devices = manager(&transport, Arc::clone(&store) as Arc<dyn DevicePreferenceStore>);
    let mut rx = devices.subscribe();
    assert_eq!(rx.borrow_and_update().status, SessionStatus::Disconnected);

    let outcome = devices.auto_reconnect().await;
    assert!(matches!(outcome, ReconnectOutcome::Connected(ref d) if d.id == "X"));

    let session = rx.borrow_and_update().clone();
    assert_eq!(session.status, SessionStatus::Connected);
    assert_eq!(session.device_id.as_deref(), Some("X"));
    assert!(transport.is_connected("X"));
}

#[tokio::test]
async fn reconnect_passes_through_connecting() {
    let store = Arc::new(InMemoryStore::new());
    store
        .set_last_known_device(&KnownDevice {
            id: "X".into(),
            name: Some("SmartStep".into()),
        })
        .expect("save device");
    store.set_auto_connect_enabled(true).expect("save pref");

    let radio = SimulatedTransport::new();
    radio.authorize(DiscoveredDevice::new("X", Some("SmartStep")));
    let transport = GatedTransport::new(radio);
    let devices = DeviceSessionManager::new(
        Arc::clone(&transport) as Arc<dyn DeviceTransport>,
        Arc::clone(&store) as Arc<dyn DevicePreferenceStore>,
        SessionSettings::default(),
    );

    let mut rx = devices.subscribe();
    let first = rx.borrow_and_update().status;
    let recorder = tokio::spawn(async move {
        let mut seen = vec![first];
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().status;
            if seen.last() != Some(&status) {
                seen.push(status);
            }
            if status == SessionStatus::Connected {
                break;
            }
        }
        seen
    });

    let reconnect = {
        let devices = Arc::clone(&devices);
        tokio::spawn(async move { devices.auto_reconnect().await })
    };

    let mut watcher = devices.subscribe();
    let held = tokio::time::timeout(
        Duration::from_secs(5),
        watcher.wait_for(|s| s.status == SessionStatus::Connecting),
    )
    .await
    .expect("connecting observed")
    .expect("manager alive")
    .clone();
    assert_eq!(held.device_id.as_deref(), Some("X"));
    assert!(!transport.inner.is_connected("X"));

    transport.open();
    let outcome = reconnect.await.expect("reconnect task");
    assert!(matches!(outcome, ReconnectOutcome::Connected(ref d) if d.id == "X"));

    let seen = tokio::time::timeout(Duration::from_secs(5), recorder)
        .await
        .expect("recorder finished")
        .expect("recorder task");
    assert_eq!(
        seen,
        vec![
            SessionStatus::Disconnected,
            SessionStatus::Connecting,
            SessionStatus::Connected
        ]
    );
    assert!(transport.inner.is_connected("X"));
}

#[tokio::test]
async fn reconnect_is_skipped_when_disabled() {
    let store = Arc::new(InMemoryStore::new());
    store
        .set_last_known_device(&KnownDevice {
            id: "X".into(),
            name: None,
        })
        .expect("save device");

    let transport = Arc::new(SimulatedTransport::new());
    transport.authorize(DiscoveredDevice::new("X", None));
    let devices = manager(&transport, Arc::clone(&store) as Arc<dyn DevicePreferenceStore>);

    assert_eq!(
        devices.auto_reconnect().await,
        ReconnectOutcome::Skipped(SkipReason::Disabled)
    );
    assert!(!transport.is_connected("X"));
}

#[tokio::test]
async fn preferences_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fallsentry.db");
    let path = path.to_str().expect("utf8");

    let transport = Arc::new(SimulatedTransport::with_demo_device());
    {
        let store = Arc::new(SqliteStore::new(path).expect("open"));
        let devices = manager(&transport, store);
        devices.set_auto_connect(true).expect("save pref");
        let found = devices.scan().await.expect("scan");
        devices.connect(&found[0]).await.expect("connect");
        devices.disconnect().await.expect("disconnect");
    }

    let store = Arc::new(SqliteStore::new(path).expect("reopen"));
    let devices = manager(&transport, store);
    let session = devices.snapshot();
    assert!(session.auto_connect_enabled);
    assert_eq!(
        session.last_known_device.map(|d| d.id).as_deref(),
        Some("SIM-0001")
    );
    assert!(matches!(
        devices.auto_reconnect().await,
        ReconnectOutcome::Connected(_)
    ));
}

// ---------------------------------------------------------------------------
// Device fall signal to dispatch
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn wearable_fall_payload_escalates_after_countdown() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(2)));
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(10));

    let transport = Arc::new(SimulatedTransport::with_demo_device());
    let devices = manager(&transport, Arc::clone(&store) as Arc<dyn DevicePreferenceStore>);
    let shutdown = CancellationToken::new();
    let follower = machine.follow_device_signals(devices.subscribe_signals(), shutdown.clone());

    let found = devices.scan().await.expect("scan");
    devices.connect(&found[0]).await.expect("connect");

    assert!(transport.notify("SIM-0001", b"HEARTBEAT").await);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(machine.snapshot().state, FallState::Monitoring);

    assert!(transport.notify("SIM-0001", b"FALL").await);
    let event = wait_for(&machine, |e| e.state == FallState::Detected).await;
    assert_eq!(event.source, Some(TriggerSource::Device));

    let event = wait_for(&machine, |e| e.outcome.is_some()).await;
    assert!(event.outcome.expect("result").overall_success);
    assert_eq!(sms.sends(), 2);
    let history = store.recent_dispatches(1).expect("history");
    assert_eq!(history[0].source, TriggerSource::Device);

    shutdown.cancel();
    follower.await.expect("follower exits");
}

#[tokio::test(start_paused = true)]
async fn fall_signal_while_disarmed_is_dropped() {
    let store = Arc::new(InMemoryStore::with_contacts(contacts(1)));
    let sms = ScriptedChannel::healthy(ChannelKind::TwilioSms);
    let machine = armed_machine(&store, &[Arc::clone(&sms)], countdown_settings(5));
    machine.arm_monitoring(false);

    let transport = Arc::new(SimulatedTransport::with_demo_device());
    let devices = manager(&transport, Arc::clone(&store) as Arc<dyn DevicePreferenceStore>);
    let shutdown = CancellationToken::new();
    let follower = machine.follow_device_signals(devices.subscribe_signals(), shutdown.clone());

    let found = devices.scan().await.expect("scan");
    devices.connect(&found[0]).await.expect("connect");
    assert!(transport.notify("SIM-0001", b"FALL").await);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(machine.snapshot().state, FallState::Idle);
    assert_eq!(sms.sends(), 0);

    shutdown.cancel();
    follower.await.expect("follower exits");
}

#[tokio::test]
async fn link_loss_returns_session_to_disconnected() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(SimulatedTransport::with_demo_device());
    let devices = manager(&transport, Arc::clone(&store) as Arc<dyn DevicePreferenceStore>);

    let found = devices.scan().await.expect("scan");
    devices.connect(&found[0]).await.expect("connect");
    let mut rx = devices.subscribe();

    transport.drop_link("SIM-0001").await;
    let session = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.status == SessionStatus::Disconnected),
    )
    .await
    .expect("disconnect observed")
    .expect("manager alive")
    .clone();

    assert!(session.device_id.is_none());
    assert_eq!(
        session.last_known_device.map(|d| d.id).as_deref(),
        Some("SIM-0001")
    );
}
