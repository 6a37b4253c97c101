use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::countdown::Countdown;
use super::device_session::DeviceFallSignal;
use super::dispatcher::AlertDispatcher;
use crate::domain::entities::dispatch::{DispatchRecord, DispatchResult};
use crate::domain::entities::fall_event::{FallEvent, FallState};
use crate::domain::ports::channel::NotificationChannel;
use crate::domain::ports::store::{ContactStore, DispatchLogStore, StoreError};
use crate::domain::value_objects::trigger_source::TriggerSource;

/// A request the machine declined because of its current state.
///
/// These are no-ops, not failures: nothing changed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("monitoring disabled")]
    MonitoringDisabled,
    #[error("a fall event is already in progress")]
    AlreadyActive,
    #[error("no fall event is awaiting confirmation")]
    NotDetected,
    #[error("alert dispatch is already in progress")]
    DispatchInFlight,
    #[error("the last alert did not fail, nothing to retry")]
    NothingToRetry,
}

#[derive(Error, Debug)]
pub enum EscalationError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("No SOS contacts configured")]
    NoContacts,
    #[error("could not read emergency contacts: {0}")]
    Contacts(#[from] StoreError),
}

/// Timing and wording of an escalation.
#[derive(Debug, Clone)]
pub struct EscalationSettings {
    pub countdown: Duration,
    pub tick: Duration,
    pub message: String,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(15),
            tick: Duration::from_secs(1),
            message: crate::application::config::DEFAULT_ALERT_MESSAGE.to_string(),
        }
    }
}

struct Inner {
    event: FallEvent,
    armed: bool,
    /// Bumped on every trigger and every countdown cancellation; a countdown
    /// only acts while its generation is current.
    generation: u64,
    countdown: Option<Countdown>,
    dispatching: bool,
}

/// Owner of the single fall event.
///
/// Every transition happens under one lock, so a countdown expiry, a manual
/// escalation and a cancel racing each other resolve to exactly one winner.
pub struct FallStateMachine {
    inner: Mutex<Inner>,
    events: watch::Sender<FallEvent>,
    contacts: Arc<dyn ContactStore>,
    dispatcher: AlertDispatcher,
    channels: Vec<Arc<dyn NotificationChannel>>,
    history: Option<Arc<dyn DispatchLogStore>>,
    settings: EscalationSettings,
    this: Weak<Self>,
}

impl FallStateMachine {
    #[must_use]
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        dispatcher: AlertDispatcher,
        channels: Vec<Arc<dyn NotificationChannel>>,
        history: Option<Arc<dyn DispatchLogStore>>,
        settings: EscalationSettings,
    ) -> Arc<Self> {
        let initial = FallEvent::idle(settings.countdown);
        let (events, _) = watch::channel(initial.clone());
        Arc::new_cyclic(|this| Self {
            inner: Mutex::new(Inner {
                event: initial,
                armed: false,
                generation: 0,
                countdown: None,
                dispatching: false,
            }),
            events,
            contacts,
            dispatcher,
            channels,
            history,
            settings,
            this: this.clone(),
        })
    }

    /// Observe every published snapshot of the fall event.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FallEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> FallEvent {
        self.events.borrow().clone()
    }

    /// Turn detection on or off.
    ///
    /// Disarming during the countdown drops the event; disarming during a
    /// dispatch lets it finish and then settles in `Idle`.
    pub fn arm_monitoring(&self, enabled: bool) {
        let mut inner = self.lock();
        inner.armed = enabled;
        match (enabled, inner.event.state) {
            (true, FallState::Idle) => {
                inner.event.state = FallState::Monitoring;
                inner.event.error = None;
                tracing::info!("Fall monitoring armed");
            }
            (false, FallState::Monitoring | FallState::Resolved) => {
                inner.event.state = FallState::Idle;
                tracing::info!("Fall monitoring disarmed");
            }
            (false, FallState::Detected) => {
                Self::stop_countdown(&mut inner);
                self.reset(&mut inner);
                tracing::info!("Fall monitoring disarmed, pending event dropped");
            }
            (false, FallState::Escalating) => {
                tracing::info!("Fall monitoring will disarm once the dispatch completes");
            }
            _ => return,
        }
        self.publish(&inner);
    }

    /// Operator test button.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] if monitoring is off or an event is active.
    pub fn simulate_trigger(&self) -> Result<(), Rejection> {
        self.trigger(TriggerSource::Manual)
    }

    /// A fall was suspected: start the confirmation countdown.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::MonitoringDisabled`] when disarmed, or
    /// [`Rejection::AlreadyActive`] while an event is in progress.
    pub fn trigger(&self, source: TriggerSource) -> Result<(), Rejection> {
        let mut inner = self.lock();
        if !inner.armed || inner.event.state == FallState::Idle {
            tracing::debug!(%source, "Fall trigger ignored: monitoring disabled");
            return Err(Rejection::MonitoringDisabled);
        }
        if inner.event.state.is_active() || inner.dispatching {
            tracing::debug!(%source, "Fall trigger ignored: event already active");
            return Err(Rejection::AlreadyActive);
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.event.state = FallState::Detected;
        inner.event.detected_at = Some(Utc::now());
        inner.event.source = Some(source);
        inner.event.countdown_remaining = self.settings.countdown;
        inner.event.error = None;

        let on_tick = {
            let this = self.this.clone();
            move |remaining| {
                if let Some(machine) = this.upgrade() {
                    machine.on_tick(generation, remaining);
                }
            }
        };
        let on_fire = {
            let this = self.this.clone();
            move || async move {
                if let Some(machine) = this.upgrade() {
                    machine.on_countdown_expired(generation).await;
                }
            }
        };
        inner.countdown = Some(Countdown::start(
            self.settings.countdown,
            self.settings.tick,
            on_tick,
            on_fire,
        ));

        tracing::info!(
            %source,
            countdown_secs = self.settings.countdown.as_secs(),
            "Fall detected, awaiting confirmation"
        );
        self.publish(&inner);
        Ok(())
    }

    /// "I'm OK": drop the pending event before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::DispatchInFlight`] once sends have started, or
    /// [`Rejection::NotDetected`] when there is nothing to cancel.
    pub fn cancel(&self) -> Result<(), Rejection> {
        let mut inner = self.lock();
        match inner.event.state {
            FallState::Detected => {
                Self::stop_countdown(&mut inner);
                self.reset(&mut inner);
                tracing::info!("Fall event cancelled by the user");
                self.publish(&inner);
                Ok(())
            }
            FallState::Escalating => {
                tracing::debug!("Cancel ignored: dispatch already in flight");
                Err(Rejection::DispatchInFlight)
            }
            _ => Err(Rejection::NotDetected),
        }
    }

    /// Skip the rest of the countdown and notify contacts now.
    ///
    /// # Errors
    ///
    /// Returns [`EscalationError::Rejected`] if no event is awaiting
    /// confirmation, or a configuration error if no contact can be notified.
    pub async fn confirm_escalate_now(&self) -> Result<DispatchResult, EscalationError> {
        let source = self.claim_detected(None)?;
        self.escalate(source).await
    }

    /// Send the alert again after a dispatch that reached nobody.
    ///
    /// # Errors
    ///
    /// Returns [`EscalationError::Rejected`] unless the machine is monitoring
    /// and the last dispatch failed, or a configuration error as for escalation.
    pub async fn retry_dispatch(&self) -> Result<DispatchResult, EscalationError> {
        self.claim_retry()?;
        self.escalate(TriggerSource::Retry).await
    }

    /// Feed device fall signals into the machine until `shutdown` fires or
    /// the sender goes away.
    pub fn follow_device_signals(
        &self,
        mut signals: broadcast::Receiver<DeviceFallSignal>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let this = self.this.clone();
        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    () = shutdown.cancelled() => break,
                    received = signals.recv() => received,
                };
                match signal {
                    Ok(signal) => {
                        let Some(machine) = this.upgrade() else { break };
                        tracing::info!(device = %signal.device_id, "Fall signal from device");
                        if let Err(rejection) = machine.trigger(TriggerSource::Device) {
                            tracing::debug!("Device fall signal ignored: {rejection}");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Fall signal receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // --- internals ---

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Transitions never panic while holding the lock; recover the state if one did.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.events.send_replace(inner.event.clone());
    }

    fn stop_countdown(inner: &mut Inner) {
        if let Some(countdown) = inner.countdown.take() {
            countdown.cancel();
        }
        inner.generation += 1;
    }

    /// Back to the resting state for the current arming, countdown full.
    fn reset(&self, inner: &mut Inner) {
        inner.event.state = if inner.armed {
            FallState::Monitoring
        } else {
            FallState::Idle
        };
        inner.event.detected_at = None;
        inner.event.source = None;
        inner.event.countdown_remaining = self.settings.countdown;
    }

    fn on_tick(&self, generation: u64, remaining: Duration) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.event.state == FallState::Detected {
            inner.event.countdown_remaining = remaining;
            self.publish(&inner);
        }
    }

    async fn on_countdown_expired(&self, generation: u64) {
        let source = match self.claim_detected(Some(generation)) {
            Ok(source) => source,
            Err(rejection) => {
                tracing::debug!("Countdown expiry ignored: {rejection}");
                return;
            }
        };
        tracing::info!("Countdown expired without response, escalating");
        if let Err(e) = self.escalate(source).await {
            tracing::warn!("Escalation failed: {e}");
        }
    }

    /// The single guard: only one caller moves `Detected` to `Escalating`.
    fn claim_detected(&self, generation: Option<u64>) -> Result<TriggerSource, Rejection> {
        let mut inner = self.lock();
        if inner.event.state == FallState::Escalating || inner.dispatching {
            return Err(Rejection::DispatchInFlight);
        }
        if inner.event.state != FallState::Detected
            || generation.is_some_and(|g| g != inner.generation)
        {
            return Err(Rejection::NotDetected);
        }
        if let Some(countdown) = inner.countdown.take() {
            countdown.cancel();
        }
        inner.dispatching = true;
        inner.event.state = FallState::Escalating;
        inner.event.countdown_remaining = Duration::ZERO;
        self.publish(&inner);
        Ok(inner.event.source.unwrap_or_default())
    }

    fn claim_retry(&self) -> Result<(), Rejection> {
        let mut inner = self.lock();
        if inner.dispatching || inner.event.state == FallState::Escalating {
            return Err(Rejection::DispatchInFlight);
        }
        match inner.event.state {
            FallState::Idle => return Err(Rejection::MonitoringDisabled),
            FallState::Detected => return Err(Rejection::AlreadyActive),
            _ => {}
        }
        if !inner.event.last_dispatch_failed() {
            return Err(Rejection::NothingToRetry);
        }
        inner.dispatching = true;
        inner.event.state = FallState::Escalating;
        inner.event.detected_at = Some(Utc::now());
        inner.event.source = Some(TriggerSource::Retry);
        inner.event.countdown_remaining = Duration::ZERO;
        tracing::info!("Retrying alert dispatch");
        self.publish(&inner);
        Ok(())
    }

    async fn escalate(&self, source: TriggerSource) -> Result<DispatchResult, EscalationError> {
        let contacts = match self.contacts.list() {
            Ok(contacts) if contacts.is_empty() => {
                self.finish_unsent(&EscalationError::NoContacts);
                return Err(EscalationError::NoContacts);
            }
            Ok(contacts) => contacts,
            Err(e) => {
                let err = EscalationError::Contacts(e);
                self.finish_unsent(&err);
                return Err(err);
            }
        };

        let result = self
            .dispatcher
            .dispatch(&contacts, &self.channels, &self.settings.message)
            .await;

        if let Some(history) = &self.history {
            let record = DispatchRecord {
                source,
                result: result.clone(),
            };
            if let Err(e) = history.record_dispatch(&record) {
                tracing::warn!("Failed to record dispatch: {e}");
            }
        }

        self.finish(result.clone());
        Ok(result)
    }

    fn finish(&self, result: DispatchResult) {
        let mut inner = self.lock();
        inner.dispatching = false;
        inner.event.error = result.configuration_error.clone();
        inner.event.outcome = Some(result);
        inner.event.state = FallState::Resolved;
        self.publish(&inner);

        self.reset(&mut inner);
        tracing::info!(state = %inner.event.state, "Fall event resolved");
        self.publish(&inner);
    }

    fn finish_unsent(&self, err: &EscalationError) {
        let mut inner = self.lock();
        inner.dispatching = false;
        inner.event.error = Some(err.to_string());
        self.reset(&mut inner);
        tracing::warn!("Alert not sent: {err}");
        self.publish(&inner);
    }
}
