use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::buttons::{ButtonEvent, ButtonPad};
use crate::config::PilotConfig;
use crate::drone::{ConnectionState, DroneControl, DroneEvent, FlyingState};
use crate::engine::{CommandFusionEngine, EngineState, TickOutcome};
use crate::error::{PilotError, PilotResult};
use crate::sensors::SensorSource;
use crate::touch::TouchEvent;
use crate::types::{AxisCommand, ControlMode, DirectionSet};

/// Take-off/land toggle offered to the pilot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotAction {
    TakeOff,
    Land,
}

impl PilotAction {
    fn for_flying_state(state: FlyingState) -> Option<Self> {
        match state {
            FlyingState::Landed => Some(PilotAction::TakeOff),
            FlyingState::Flying | FlyingState::Hovering => Some(PilotAction::Land),
            _ => None,
        }
    }
}

/// UI-facing view of the vehicle, fed only by drone events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightStatus {
    pub connection: ConnectionState,
    pub flying: Option<FlyingState>,
    pub battery_percent: Option<u8>,
}

impl Default for FlightStatus {
    fn default() -> Self {
        FlightStatus {
            connection: ConnectionState::Stopped,
            flying: None,
            battery_percent: None,
        }
    }
}

impl FlightStatus {
    pub fn apply(&mut self, event: DroneEvent) {
        match event {
            DroneEvent::ConnectionChanged(state) => self.connection = state,
            DroneEvent::FlyingStateChanged(state) => self.flying = Some(state),
            DroneEvent::BatteryChanged(percent) => self.battery_percent = Some(percent.min(100)),
        }
    }

    /// `None` while the toggle should be disabled
    pub fn available_action(&self) -> Option<PilotAction> {
        self.flying.and_then(PilotAction::for_flying_state)
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Running
    }
}

/// Counters and last output of the fusion engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub ticks: u64,
    pub emergency_lands: u64,
    pub command: AxisCommand,
    pub directions: DirectionSet,
    pub turn_deg: f64,
}

struct Shared {
    engine: CommandFusionEngine,
    status: FlightStatus,
    stopped_tx: Option<oneshot::Sender<()>>,
}

fn lock(shared: &Mutex<Shared>) -> PilotResult<MutexGuard<'_, Shared>> {
    shared.lock().map_err(|_| PilotError::lock("session"))
}

/// One connect-to-disconnect control session
///
/// Owns the fusion engine behind a mutex shared by the tick task, the drone
/// event pump and the touch/button entry points. Must be started from within
/// a Tokio runtime.
pub struct ControlSession<D: DroneControl> {
    session_id: String,
    started_at: DateTime<Utc>,
    mode: ControlMode,
    drone: Arc<D>,
    shared: Arc<Mutex<Shared>>,
    pad: ButtonPad,
    disconnect_timeout: Option<Duration>,
    stop_tx: watch::Sender<bool>,
    stopped_rx: Option<oneshot::Receiver<()>>,
    tick_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
}

impl<D: DroneControl> ControlSession<D> {
    /// Connect the drone, activate the engine and start ticking
    pub fn start<S>(
        drone: Arc<D>,
        mode: ControlMode,
        config: &PilotConfig,
        sensors: S,
    ) -> PilotResult<Self>
    where
        S: SensorSource + 'static,
    {
        let mut engine = CommandFusionEngine::new(mode, config)?;
        engine.start_session()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let shared = Arc::new(Mutex::new(Shared {
            engine,
            status: FlightStatus::default(),
            stopped_tx: Some(stopped_tx),
        }));

        let event_task = tokio::spawn(event_pump(event_rx, shared.clone()));
        drone.connect(event_tx);

        let tick_task = config.tick_interval(mode).map(|period| {
            tokio::spawn(tick_loop(
                period,
                drone.clone(),
                shared.clone(),
                sensors,
                stop_rx,
            ))
        });

        let session_id = format!("session_{}", Utc::now().timestamp_millis());
        log::info!("{} started in {:?} mode", session_id, mode);

        Ok(ControlSession {
            session_id,
            started_at: Utc::now(),
            mode,
            drone,
            shared,
            pad: ButtonPad::new(config.discrete_speed),
            disconnect_timeout: config.disconnect_timeout(),
            stop_tx,
            stopped_rx: Some(stopped_rx),
            tick_task,
            event_task: Some(event_task),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn drone(&self) -> &Arc<D> {
        &self.drone
    }

    pub fn status(&self) -> PilotResult<FlightStatus> {
        Ok(lock(&self.shared)?.status)
    }

    pub fn engine_state(&self) -> PilotResult<EngineState> {
        Ok(lock(&self.shared)?.engine.state())
    }

    pub fn stats(&self) -> PilotResult<EngineStats> {
        let shared = lock(&self.shared)?;
        let engine = &shared.engine;
        Ok(EngineStats {
            state: engine.state(),
            ticks: engine.tick_count(),
            emergency_lands: engine.emergency_land_count(),
            command: engine.command(),
            directions: engine.directions(),
            turn_deg: engine.last_turn().magnitude,
        })
    }

    /// Forward a pointer event to the engine
    pub fn touch(&self, event: TouchEvent) -> PilotResult<()> {
        let mut shared = lock(&self.shared)?;
        if !shared.engine.is_active() {
            return Err(PilotError::NotActive);
        }
        shared.engine.handle_touch(event, self.drone.as_ref());
        Ok(())
    }

    /// Forward a press/release from the button surface
    pub fn button(&self, event: ButtonEvent) -> PilotResult<()> {
        if self.mode != ControlMode::Buttons {
            return Err(PilotError::InvalidState(format!(
                "buttons are not wired in {:?} mode",
                self.mode
            )));
        }
        let shared = lock(&self.shared)?;
        if !shared.engine.is_active() {
            return Err(PilotError::NotActive);
        }
        self.pad.handle(event, self.drone.as_ref());
        Ok(())
    }

    /// Take off when landed, land when airborne, otherwise nothing
    pub fn take_off_or_land(&self) -> PilotResult<Option<PilotAction>> {
        if !lock(&self.shared)?.engine.is_active() {
            return Err(PilotError::NotActive);
        }
        let action = PilotAction::for_flying_state(self.drone.flying_state());
        match action {
            Some(PilotAction::TakeOff) => self.drone.take_off(),
            Some(PilotAction::Land) => self.drone.land(),
            None => log::debug!("take-off/land ignored in {:?}", self.drone.flying_state()),
        }
        Ok(action)
    }

    /// Cut the motors
    pub fn emergency(&self) {
        log::warn!("{} emergency requested", self.session_id);
        self.drone.emergency();
    }

    /// Neutralise the vehicle, stop ticking and disconnect
    ///
    /// Waits for the drone to report `Stopped`, bounded by `disconnect_timeout_ms`.
    pub async fn shutdown(mut self) -> PilotResult<()> {
        lock(&self.shared)?
            .engine
            .request_disconnect(self.drone.as_ref())?;

        let _ = self.stop_tx.send(true);
        if let Some(task) = self.tick_task.take() {
            let _ = task.await;
        }

        let drone = self.drone.clone();
        tokio::task::spawn_blocking(move || drone.disconnect())
            .await
            .map_err(|e| PilotError::Internal(format!("disconnect worker failed: {}", e)))?;

        let stopped = self
            .stopped_rx
            .take()
            .ok_or_else(|| PilotError::InvalidState("session already shut down".to_string()))?;

        let result = match self.disconnect_timeout {
            Some(limit) => match tokio::time::timeout(limit, stopped).await {
                Ok(_) => Ok(()),
                Err(_) => {
                    log::warn!("{} disconnect not confirmed after {:?}", self.session_id, limit);
                    Err(PilotError::DisconnectTimeout(limit))
                }
            },
            None => {
                let _ = stopped.await;
                Ok(())
            }
        };

        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        if result.is_ok() {
            log::info!("{} disconnected", self.session_id);
        }
        result
    }
}

impl<D: DroneControl> Drop for ControlSession<D> {
    // Dropped without `shutdown`: neutralise and disconnect without waiting
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);

        let abandoned = {
            let mut shared = match self.shared.lock() {
                Ok(shared) => shared,
                Err(poisoned) => poisoned.into_inner(),
            };
            shared.engine.is_active()
                && shared.engine.request_disconnect(self.drone.as_ref()).is_ok()
        };
        if abandoned {
            log::warn!("{} dropped while active, disconnecting", self.session_id);
            let drone = self.drone.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || drone.disconnect());
                }
                Err(_) => drone.disconnect(),
            }
        }

        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}

async fn tick_loop<D, S>(
    period: Duration,
    drone: Arc<D>,
    shared: Arc<Mutex<Shared>>,
    mut sensors: S,
    mut stop_rx: watch::Receiver<bool>,
) where
    D: DroneControl,
    S: SensorSource,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = sensors.poll();
                let outcome = match lock(&shared) {
                    Ok(mut shared) => shared.engine.tick(&frame, drone.as_ref()),
                    Err(e) => {
                        log::error!("tick aborted: {}", e);
                        break;
                    }
                };
                if outcome == TickOutcome::Inactive {
                    break;
                }
            }
            _ = stop_rx.changed() => break,
        }
    }
    log::debug!("tick loop stopped");
}

async fn event_pump(mut events: mpsc::Receiver<DroneEvent>, shared: Arc<Mutex<Shared>>) {
    while let Some(event) = events.recv().await {
        let mut shared = match lock(&shared) {
            Ok(shared) => shared,
            Err(e) => {
                log::error!("drone event dropped: {}", e);
                break;
            }
        };
        shared.status.apply(event);

        match event {
            DroneEvent::ConnectionChanged(ConnectionState::Running) => {
                log::info!("drone connected");
            }
            DroneEvent::ConnectionChanged(ConnectionState::Stopped) => {
                if let Some(tx) = shared.stopped_tx.take() {
                    let _ = tx.send(());
                }
                shared.engine.connection_lost();
                break;
            }
            DroneEvent::ConnectionChanged(state) => log::debug!("connection {:?}", state),
            DroneEvent::FlyingStateChanged(state) => log::debug!("flying state {:?}", state),
            DroneEvent::BatteryChanged(percent) => log::debug!("battery {}%", percent),
        }
    }
}
