use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::types::{Axis, AxisCommand};

/// Link state reported by the drone controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Stopped,
    Starting,
    Running,
    Pausing,
    Paused,
    Stopping,
}

/// Piloting state reported by the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlyingState {
    Landed,
    TakingOff,
    Hovering,
    Flying,
    Landing,
    Emergency,
    Rolling,
    Init,
}

/// Asynchronous notification from the drone controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum DroneEvent {
    ConnectionChanged(ConnectionState),
    FlyingStateChanged(FlyingState),
    BatteryChanged(u8),
}

/// Drone-control collaborator driven by the fusion engine
///
/// Implementations wrap a device handle and are shared between the tick task
/// and the teardown worker, hence `&self` everywhere.
pub trait DroneControl: Send + Sync + 'static {
    /// Start connecting; state changes are delivered on `events` until `disconnect`
    fn connect(&self, events: mpsc::Sender<DroneEvent>);
    /// Request disconnection; completion is signalled by `ConnectionChanged(Stopped)`
    fn disconnect(&self);
    fn take_off(&self);
    fn land(&self);
    fn emergency(&self);
    fn set_pitch(&self, value: i8);
    fn set_roll(&self, value: i8);
    fn set_yaw(&self, value: i8);
    fn set_gaz(&self, value: i8);
    fn set_flag(&self, enabled: bool);
    fn connection_state(&self) -> ConnectionState;
    fn flying_state(&self) -> FlyingState;

    /// Push a full piloting command
    fn send_command(&self, command: &AxisCommand) {
        self.set_flag(command.movement());
        self.set_pitch(command.pitch());
        self.set_roll(command.roll());
        self.set_yaw(command.yaw());
        self.set_gaz(command.gaz());
    }
}

/// One collaborator call, as recorded by `RecordingDrone`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", content = "value", rename_all = "snake_case")]
pub enum DroneCall {
    Connect,
    Disconnect,
    TakeOff,
    Land,
    Emergency,
    Pitch(i8),
    Roll(i8),
    Yaw(i8),
    Gaz(i8),
    Flag(bool),
}

struct RecordingInner {
    calls: Vec<DroneCall>,
    events: Option<mpsc::Sender<DroneEvent>>,
    connection: ConnectionState,
    flying: FlyingState,
    piloting: AxisCommand,
    confirm_disconnect: bool,
}

/// In-memory drone that records every call and simulates state notifications
///
/// Used by the simulator binary and by tests.
pub struct RecordingDrone {
    inner: Mutex<RecordingInner>,
}

impl RecordingDrone {
    pub fn new() -> Self {
        RecordingDrone {
            inner: Mutex::new(RecordingInner {
                calls: Vec::new(),
                events: None,
                connection: ConnectionState::Stopped,
                flying: FlyingState::Landed,
                piloting: AxisCommand::neutral(),
                confirm_disconnect: true,
            }),
        }
    }

    /// A drone that never reports `Stopped` after `disconnect`
    pub fn unresponsive() -> Self {
        let drone = Self::new();
        if let Ok(mut inner) = drone.inner.lock() {
            inner.confirm_disconnect = false;
        }
        drone
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut RecordingInner) -> T) -> Option<T> {
        self.inner.lock().ok().map(|mut inner| f(&mut inner))
    }

    fn record(&self, call: DroneCall) {
        self.with_inner(|inner| {
            inner.calls.push(call);
            match call {
                DroneCall::Pitch(v) => inner.piloting.set_axis(Axis::Pitch, v as f64),
                DroneCall::Roll(v) => inner.piloting.set_axis(Axis::Roll, v as f64),
                DroneCall::Yaw(v) => inner.piloting.set_axis(Axis::Yaw, v as f64),
                DroneCall::Gaz(v) => inner.piloting.set_axis(Axis::Gaz, v as f64),
                DroneCall::Flag(v) => inner.piloting.set_movement(v),
                _ => {}
            }
        });
    }

    fn notify(inner: &mut RecordingInner, event: DroneEvent) {
        match event {
            DroneEvent::ConnectionChanged(state) => inner.connection = state,
            DroneEvent::FlyingStateChanged(state) => inner.flying = state,
            DroneEvent::BatteryChanged(_) => {}
        }
        if let Some(tx) = &inner.events {
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    log::warn!("drone event channel full, dropped {:?}", event);
                }
                Err(TrySendError::Closed(_)) => inner.events = None,
            }
        }
    }

    /// Simulate a notification from the vehicle
    pub fn emit(&self, event: DroneEvent) {
        self.with_inner(|inner| Self::notify(inner, event));
    }

    pub fn calls(&self) -> Vec<DroneCall> {
        self.with_inner(|inner| inner.calls.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        self.with_inner(|inner| inner.calls.clear());
    }

    /// Piloting values as the vehicle currently sees them
    pub fn piloting(&self) -> AxisCommand {
        self.with_inner(|inner| inner.piloting).unwrap_or_default()
    }

    pub fn count(&self, call: DroneCall) -> usize {
        self.with_inner(|inner| inner.calls.iter().filter(|c| **c == call).count())
            .unwrap_or(0)
    }
}

impl Default for RecordingDrone {
    fn default() -> Self {
        Self::new()
    }
}

impl DroneControl for RecordingDrone {
    fn connect(&self, events: mpsc::Sender<DroneEvent>) {
        self.record(DroneCall::Connect);
        self.with_inner(|inner| {
            inner.events = Some(events);
            Self::notify(inner, DroneEvent::ConnectionChanged(ConnectionState::Starting));
            Self::notify(inner, DroneEvent::ConnectionChanged(ConnectionState::Running));
        });
    }

    fn disconnect(&self) {
        self.record(DroneCall::Disconnect);
        self.with_inner(|inner| {
            Self::notify(inner, DroneEvent::ConnectionChanged(ConnectionState::Stopping));
            if inner.confirm_disconnect {
                Self::notify(inner, DroneEvent::ConnectionChanged(ConnectionState::Stopped));
                inner.events = None;
            }
        });
    }

    fn take_off(&self) {
        self.record(DroneCall::TakeOff);
        self.with_inner(|inner| {
            Self::notify(inner, DroneEvent::FlyingStateChanged(FlyingState::TakingOff));
            Self::notify(inner, DroneEvent::FlyingStateChanged(FlyingState::Hovering));
        });
    }

    fn land(&self) {
        self.record(DroneCall::Land);
        self.with_inner(|inner| {
            Self::notify(inner, DroneEvent::FlyingStateChanged(FlyingState::Landing));
            Self::notify(inner, DroneEvent::FlyingStateChanged(FlyingState::Landed));
        });
    }

    fn emergency(&self) {
        self.record(DroneCall::Emergency);
        self.with_inner(|inner| {
            Self::notify(inner, DroneEvent::FlyingStateChanged(FlyingState::Emergency));
        });
    }

    fn set_pitch(&self, value: i8) {
        self.record(DroneCall::Pitch(value));
    }

    fn set_roll(&self, value: i8) {
        self.record(DroneCall::Roll(value));
    }

    fn set_yaw(&self, value: i8) {
        self.record(DroneCall::Yaw(value));
    }

    fn set_gaz(&self, value: i8) {
        self.record(DroneCall::Gaz(value));
    }

    fn set_flag(&self, enabled: bool) {
        self.record(DroneCall::Flag(enabled));
    }

    fn connection_state(&self) -> ConnectionState {
        self.with_inner(|inner| inner.connection)
            .unwrap_or(ConnectionState::Stopped)
    }

    fn flying_state(&self) -> FlyingState {
        self.with_inner(|inner| inner.flying).unwrap_or(FlyingState::Init)
    }
}
