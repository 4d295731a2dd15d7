//! [`DriveSession`] – the single task that owns the safety controller.
//!
//! Three kinds of input are multiplexed with `tokio::select!` and handled
//! one at a time:
//!
//! 1. **Commands** from a [`SessionHandle`] (toggle, PIN entry, override,
//!    emergency call, messaging, shutdown).  Each gets a reply.
//! 2. **Cooldown expiries** from the [`TokioCooldownTimer`].
//! 3. **Sensor readings** from the [`SpeedSource`] stream.  Speed samples go
//!    through the accident detector first, then the activation threshold.
//!
//! After every handled input the committed transitions are published on
//! [`Topic::SafetyState`] and a fresh [`SessionSnapshot`] is sent on the
//! watch channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use drivesafe_runtime::session::{DriveSession, SessionCommand, SessionConfig, SessionParts};
//! use drivesafe_hal::{SimSpeedSource, TelUriDialer};
//! use drivesafe_kernel::StaticPinVerifier;
//! use drivesafe_middleware::EventBus;
//!
//! # async fn demo() {
//! let handle = DriveSession::spawn(
//!     SessionConfig::default(),
//!     SessionParts {
//!         verifier: Box::new(StaticPinVerifier::default()),
//!         source: Box::new(SimSpeedSource::default()),
//!         dialer: Box::new(TelUriDialer),
//!         bus: EventBus::default(),
//!     },
//! );
//! let state = handle.send(SessionCommand::Toggle(true)).await;
//! handle.shutdown().await;
//! # }
//! ```

use std::fmt;

use drivesafe_hal::{EmergencyDialer, SensorReading, SpeedSource};
use drivesafe_kernel::{
    AccidentDetector, AccidentThresholds, ControllerConfig, MessageSettings, Notifier,
    PinVerifier, SafetyController,
};
use drivesafe_kernel::messages::DEFAULT_AUTO_RESPONSE;
use drivesafe_middleware::{EventBus, Topic};
use drivesafe_types::{
    Event, EventPayload, GeoPosition, Notice, SafetyError, SafetyState, SpeedSample,
};
use futures_util::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cooldown_timer::TokioCooldownTimer;
use crate::notifier::BusNotifier;

const SOURCE: &str = "drivesafe-runtime::session";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub controller: ControllerConfig,
    pub accident: AccidentThresholds,
    pub auto_response: String,
    /// Commands buffered before [`SessionHandle::send`] waits.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            accident: AccidentThresholds::default(),
            auto_response: DEFAULT_AUTO_RESPONSE.to_string(),
            command_buffer: 32,
        }
    }
}

/// Injected capabilities.
pub struct SessionParts {
    pub verifier: Box<dyn PinVerifier>,
    pub source: Box<dyn SpeedSource>,
    pub dialer: Box<dyn EmergencyDialer>,
    pub bus: EventBus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands & snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// Driver-side inputs.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// The safety-mode switch; `true` requests activation, `false`
    /// deactivation.
    Toggle(bool),
    SubmitPin(String),
    CancelPin,
    EmergencyOverride,
    /// Dial the configured emergency number.  No state change.
    EmergencyCall,
    SetAutoResponse(String),
    /// Someone messaged the driver.
    IncomingMessage { from: String },
    /// External accident signal, e.g. from a crash sensor.
    AccidentSignal,
    Shutdown,
}

impl fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCommand::Toggle(on) => f.debug_tuple("Toggle").field(on).finish(),
            SessionCommand::SubmitPin(_) => f.write_str("SubmitPin(<redacted>)"),
            SessionCommand::CancelPin => f.write_str("CancelPin"),
            SessionCommand::EmergencyOverride => f.write_str("EmergencyOverride"),
            SessionCommand::EmergencyCall => f.write_str("EmergencyCall"),
            SessionCommand::SetAutoResponse(text) => {
                f.debug_tuple("SetAutoResponse").field(text).finish()
            }
            SessionCommand::IncomingMessage { from } => {
                f.debug_struct("IncomingMessage").field("from", from).finish()
            }
            SessionCommand::AccidentSignal => f.write_str("AccidentSignal"),
            SessionCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Everything a status view needs, refreshed after every input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SafetyState,
    pub speed_kmh: f64,
    pub position: GeoPosition,
    pub cooldown_remaining_secs: Option<u64>,
    pub auto_response: String,
    /// A location error was the most recent reading.
    pub location_fault: bool,
    pub source: String,
}

struct Request {
    command: SessionCommand,
    reply: oneshot::Sender<Result<SafetyState, SafetyError>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Owner-side handle.  Dropping it aborts the session task, which releases
/// the sensor stream and the cooldown timer.
pub struct SessionHandle {
    commands: mpsc::Sender<Request>,
    snapshot: watch::Receiver<SessionSnapshot>,
    bus: EventBus,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Deliver `command` and wait for the resulting state.
    ///
    /// # Errors
    ///
    /// The controller's own error, or [`SafetyError::Channel`] if the
    /// session has stopped.
    pub async fn send(&self, command: SessionCommand) -> Result<SafetyState, SafetyError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| SafetyError::Channel("drive session has stopped".to_string()))?;
        response
            .await
            .map_err(|_| SafetyError::Channel("drive session dropped the reply".to_string()))?
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified after every handled input.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Stop the session and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.send(SessionCommand::Shutdown).await {
            debug!(error = %e, "session already stopped");
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "drive session task failed");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

pub struct DriveSession {
    controller: SafetyController,
    detector: AccidentDetector,
    messages: MessageSettings,
    notifier: BusNotifier,
    dialer: Box<dyn EmergencyDialer>,
    bus: EventBus,
    snapshot: watch::Sender<SessionSnapshot>,
    speed_kmh: f64,
    position: GeoPosition,
    location_fault: bool,
    source_name: String,
}

impl DriveSession {
    /// Spawn the session onto the current Tokio runtime.
    pub fn spawn(config: SessionConfig, parts: SessionParts) -> SessionHandle {
        let SessionParts {
            verifier,
            source,
            dialer,
            bus,
        } = parts;

        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let notifier = BusNotifier::new(bus.clone(), SOURCE);
        let controller = SafetyController::new(
            config.controller,
            verifier,
            Box::new(notifier.clone()),
            Box::new(TokioCooldownTimer::new(expiry_tx)),
        );

        let source_name = source.name().to_string();
        let readings = source.into_stream();

        let mut session = DriveSession {
            controller,
            detector: AccidentDetector::new(config.accident),
            messages: MessageSettings::new(config.auto_response),
            notifier,
            dialer,
            bus: bus.clone(),
            snapshot: watch::channel(SessionSnapshot {
                state: SafetyState::Disabled,
                speed_kmh: 0.0,
                position: GeoPosition::DEFAULT_CENTER,
                cooldown_remaining_secs: None,
                auto_response: String::new(),
                location_fault: false,
                source: String::new(),
            })
            .0,
            speed_kmh: 0.0,
            position: GeoPosition::DEFAULT_CENTER,
            location_fault: false,
            source_name,
        };
        let snapshot_rx = session.snapshot.subscribe();
        session.publish_snapshot();

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let task = tokio::spawn(session.run(command_rx, expiry_rx, readings));

        SessionHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            bus,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Request>,
        mut expiries: mpsc::UnboundedReceiver<u64>,
        readings: BoxStream<'static, SensorReading>,
    ) {
        info!(source = %self.source_name, "drive session started");
        let mut readings = Some(readings);

        loop {
            tokio::select! {
                request = commands.recv() => {
                    let Some(Request { command, reply }) = request else {
                        debug!("all session handles dropped");
                        break;
                    };
                    if command == SessionCommand::Shutdown {
                        let _ = reply.send(Ok(self.controller.state()));
                        break;
                    }
                    let result = self.handle_command(command);
                    self.after_input();
                    let _ = reply.send(result);
                }
                Some(generation) = expiries.recv() => {
                    self.controller.on_cooldown_elapsed(generation);
                    self.after_input();
                }
                reading = next_reading(&mut readings) => match reading {
                    Some(reading) => {
                        self.handle_reading(reading);
                        self.after_input();
                    }
                    None => {
                        info!(source = %self.source_name, "speed source ended");
                        readings = None;
                    }
                },
            }
        }

        drop(readings);
        self.controller.shutdown();
        info!("drive session stopped");
    }

    // ── Commands ────────────────────────────────────────────────────────────

    fn handle_command(&mut self, command: SessionCommand) -> Result<SafetyState, SafetyError> {
        debug!(?command, "session command");
        match command {
            SessionCommand::Toggle(true) => Ok(self.controller.request_activation()),
            SessionCommand::Toggle(false) => self.controller.request_deactivation(),
            SessionCommand::SubmitPin(code) => self.controller.submit_pin(&code),
            SessionCommand::CancelPin => Ok(self.controller.cancel_pin_entry()),
            SessionCommand::EmergencyOverride => self.controller.on_emergency_override(),
            SessionCommand::AccidentSignal => Ok(self.controller.on_accident_signal()),
            SessionCommand::EmergencyCall => {
                self.place_emergency_call()?;
                Ok(self.controller.state())
            }
            SessionCommand::SetAutoResponse(text) => {
                let notice = self.messages.update(text);
                self.notifier.notify(notice);
                Ok(self.controller.state())
            }
            SessionCommand::IncomingMessage { from } => {
                self.auto_reply(from);
                Ok(self.controller.state())
            }
            SessionCommand::Shutdown => Ok(self.controller.state()),
        }
    }

    fn place_emergency_call(&mut self) -> Result<(), SafetyError> {
        let number = self.controller.config().emergency_number.clone();
        if let Err(e) = self.dialer.dial(&number) {
            warn!(%number, error = %e, "emergency call failed");
            self.notifier
                .notify(Notice::critical("Call Failed", format!("Could not call {number}.")));
            return Err(e);
        }
        self.publish(EventPayload::EmergencyCall { number });
        Ok(())
    }

    fn auto_reply(&mut self, from: String) {
        let Some(message) = self.messages.auto_reply(self.controller.state()) else {
            debug!(%from, "incoming message, no auto-reply outside safety mode");
            return;
        };
        info!(recipient = %from, "sending auto-reply");
        let message = message.to_string();
        self.publish(EventPayload::AutoReply {
            recipient: from,
            message,
        });
    }

    // ── Readings ────────────────────────────────────────────────────────────

    fn handle_reading(&mut self, reading: SensorReading) {
        match reading {
            SensorReading::Speed(sample) => self.handle_speed(sample),
            SensorReading::Position(position) => {
                self.location_fault = false;
                self.position = position;
                self.publish(EventPayload::Position(position));
            }
            SensorReading::LocationError(reason) => {
                warn!(%reason, "location unavailable");
                if !self.location_fault {
                    self.location_fault = true;
                    self.notifier.notify(Notice::warning(
                        "Location Error",
                        "Unable to get your current location. Please enable GPS.",
                    ));
                }
            }
        }
    }

    fn handle_speed(&mut self, sample: SpeedSample) {
        if !sample.is_valid() {
            self.controller.on_speed_sample(&sample);
            return;
        }
        self.location_fault = false;
        self.speed_kmh = sample.speed_kmh;
        self.publish(EventPayload::Speed(sample));

        if let Some(hit) = self.detector.observe(sample) {
            warn!(
                drop_kmh = hit.drop_kmh,
                elapsed_ms = hit.elapsed.as_millis() as u64,
                "possible accident detected"
            );
            self.publish(EventPayload::AccidentDetected {
                drop_kmh: hit.drop_kmh,
                elapsed_ms: i64::try_from(hit.elapsed.as_millis()).unwrap_or(i64::MAX),
            });
            self.controller.on_accident_signal();
        }
        self.controller.on_speed_sample(&sample);
    }

    // ── Output ──────────────────────────────────────────────────────────────

    fn after_input(&mut self) {
        for t in self.controller.drain_transitions() {
            self.publish(EventPayload::StateChanged {
                from: t.from,
                to: t.to,
                cause: t.cause,
            });
        }
        self.publish_snapshot();
    }

    fn publish(&self, payload: EventPayload) {
        let topic = Topic::for_payload(&payload);
        self.bus.publish_to(topic, Event::new(SOURCE, payload));
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            state: self.controller.state(),
            speed_kmh: self.speed_kmh,
            position: self.position,
            cooldown_remaining_secs: self.controller.cooldown_remaining().map(|d| d.as_secs()),
            auto_response: self.messages.auto_response().to_string(),
            location_fault: self.location_fault,
            source: self.source_name.clone(),
        });
    }
}

/// Next reading, or pending forever once the stream is gone.
async fn next_reading(readings: &mut Option<BoxStream<'static, SensorReading>>) -> Option<SensorReading> {
    match readings {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
