use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::drone::DroneControl;
use crate::error::{PilotError, PilotResult};
use crate::sensors::SensorFrame;
use crate::tilt::{TiltClassifier, TiltReading};
use crate::touch::{PointerSet, TouchEvent, TouchZoneClassifier};
use crate::turn::{TurnDetector, TurnReading};
use crate::types::{Axis, AxisCommand, ControlMode, Direction, DirectionSet};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No session
    Idle,
    /// Connected and ticking
    Active,
    /// Session ending; terminal
    Disconnecting,
}

/// What one tick sent to the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Command(AxisCommand),
    /// Vertical spike: a land request went out instead of a command
    EmergencyLand,
    /// Engine not active, nothing sent
    Inactive,
}

/// Reduces touch, tilt, heading and gesture inputs to one bounded command per tick
///
/// All state is owned here for one control session and mutated only through
/// `&mut self`; the session layer serialises access behind a mutex.
#[derive(Debug)]
pub struct CommandFusionEngine {
    mode: ControlMode,
    state: EngineState,
    discrete_speed: f64,
    zones: TouchZoneClassifier,
    tilt: TiltClassifier,
    turn: TurnDetector,
    pointers: PointerSet,
    directions: DirectionSet,
    command: AxisCommand,
    last_tilt: Option<TiltReading>,
    last_turn: TurnReading,
    ticks: u64,
    emergency_lands: u64,
}

impl CommandFusionEngine {
    /// Build an idle engine; rejects a config that fails validation
    pub fn new(mode: ControlMode, config: &PilotConfig) -> PilotResult<Self> {
        config.validate()?;
        Ok(CommandFusionEngine {
            mode,
            state: EngineState::Idle,
            discrete_speed: config.discrete_speed as f64,
            zones: TouchZoneClassifier::new(config.zones(mode).to_vec()),
            tilt: TiltClassifier::from_config(config),
            turn: TurnDetector::from_config(config)?,
            pointers: PointerSet::new(),
            directions: DirectionSet::new(),
            command: AxisCommand::neutral(),
            last_tilt: None,
            last_turn: TurnReading::default(),
            ticks: 0,
            emergency_lands: 0,
        })
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EngineState::Active
    }

    /// Directions fused on the last tick
    pub fn directions(&self) -> DirectionSet {
        self.directions
    }

    /// Last command handed to the drone
    pub fn command(&self) -> AxisCommand {
        self.command
    }

    pub fn pointers(&self) -> &PointerSet {
        &self.pointers
    }

    pub fn last_turn(&self) -> TurnReading {
        self.last_turn
    }

    pub fn last_tilt(&self) -> Option<TiltReading> {
        self.last_tilt
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn emergency_land_count(&self) -> u64 {
        self.emergency_lands
    }

    /// Idle → Active with empty buffers
    pub fn start_session(&mut self) -> PilotResult<()> {
        match self.state {
            EngineState::Idle => {
                self.reset();
                self.state = EngineState::Active;
                log::info!("fusion engine active in {:?} mode", self.mode);
                Ok(())
            }
            EngineState::Active => Err(PilotError::AlreadyActive),
            EngineState::Disconnecting => Err(PilotError::InvalidState(
                "engine is disconnecting; start a new session".to_string(),
            )),
        }
    }

    /// Active → Disconnecting, leaving the vehicle on a neutral command
    pub fn request_disconnect<D: DroneControl + ?Sized>(&mut self, drone: &D) -> PilotResult<()> {
        match self.state {
            EngineState::Active => {
                self.reset();
                drone.send_command(&self.command);
                self.state = EngineState::Disconnecting;
                log::info!("fusion engine disconnecting after {} ticks", self.ticks);
                Ok(())
            }
            EngineState::Disconnecting => Ok(()),
            EngineState::Idle => Err(PilotError::NotActive),
        }
    }

    /// The link is gone; stop without talking to the drone
    pub fn connection_lost(&mut self) {
        if self.state == EngineState::Active {
            log::warn!("connection lost, fusion engine stopping");
            self.reset();
            self.state = EngineState::Disconnecting;
        }
    }

    /// Feed one pointer event. A cancel clears every direction and emits
    /// a neutral command immediately, outside the tick cadence.
    pub fn handle_touch<D: DroneControl + ?Sized>(
        &mut self,
        event: TouchEvent,
        drone: &D,
    ) -> Option<AxisCommand> {
        if !self.is_active() {
            return None;
        }
        log::trace!("touch {:?}", event);
        self.pointers.apply(event);
        if event != TouchEvent::Cancelled {
            return None;
        }

        self.directions.clear();
        self.command = self.fuse();
        drone.send_command(&self.command);
        Some(self.command)
    }

    /// One scheduler tick: classify, fuse, emit exactly once
    pub fn tick<D: DroneControl + ?Sized>(&mut self, frame: &SensorFrame, drone: &D) -> TickOutcome {
        if !self.is_active() {
            return TickOutcome::Inactive;
        }
        self.ticks += 1;

        let tilt = match self.mode {
            ControlMode::GSensor => frame.tilt.map(|sample| self.tilt.classify(&sample)),
            ControlMode::Flow | ControlMode::Buttons => None,
        };

        if tilt.map_or(false, |reading| reading.emergency_land) {
            self.pointers.clear();
            self.directions.clear();
            self.command = AxisCommand::neutral();
            self.last_tilt = tilt;
            self.last_turn = TurnReading::default();
            self.emergency_lands += 1;
            log::warn!(
                "vertical acceleration spike ({:.2} g), landing",
                frame.tilt.map(|s| s.z).unwrap_or_default()
            );
            drone.land();
            return TickOutcome::EmergencyLand;
        }

        let mut directions = self.zones.classify(&self.pointers);
        let mut turn = TurnReading::default();
        if self.mode == ControlMode::GSensor {
            if let Some(reading) = tilt {
                directions.extend(reading.directions);
            }
            turn = self.turn.update(frame.heading, frame.gesture);
            if turn.is_turning() {
                directions.insert(Direction::Turn);
            }
        }

        self.directions = directions;
        self.last_tilt = tilt;
        self.last_turn = turn;
        self.command = self.fuse();
        log::debug!("tick {} {:?} -> {:?}", self.ticks, self.directions, self.command);
        drone.send_command(&self.command);
        TickOutcome::Command(self.command)
    }

    fn fuse(&self) -> AxisCommand {
        let mut command = self.command;

        // Clearing pass: the union of any set with an axis pair is non-empty,
        // so every axis returns to zero before this tick's directions apply.
        for axis in Axis::ALL {
            if !self.directions.union(axis.directions()).is_empty() {
                command.clear_axis(axis);
            }
        }

        // Application pass, in `Direction::ALL` order; a later opposed direction wins
        for direction in self.directions.iter() {
            let axis = direction.axis();
            let value = match (self.mode, axis, self.last_tilt) {
                (_, Axis::Yaw, _) if direction == Direction::Turn => {
                    if self.last_turn.magnitude.abs() <= self.turn.threshold() {
                        continue;
                    }
                    self.last_turn.magnitude
                }
                (ControlMode::GSensor, Axis::Pitch, Some(tilt)) => tilt.pitch as f64,
                (ControlMode::GSensor, Axis::Roll, Some(tilt)) => tilt.roll as f64,
                _ => direction.sign() as f64 * self.discrete_speed,
            };
            if axis.uses_movement_flag() {
                command.set_movement(true);
            }
            command.set_axis(axis, value);
        }

        command
    }

    fn reset(&mut self) {
        self.pointers.clear();
        self.directions.clear();
        self.command = AxisCommand::neutral();
        self.turn.reset();
        self.last_tilt = None;
        self.last_turn = TurnReading::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drone::{DroneCall, RecordingDrone};
    use crate::tilt::TiltSample;
    use glam::Vec2;

    fn zone_center(config: &PilotConfig, mode: ControlMode, direction: Direction) -> Vec2 {
        config
            .zones(mode)
            .iter()
            .find(|z| z.direction == direction)
            .map(|z| z.center())
            .unwrap()
    }

    fn press(id: u64, at: Vec2) -> TouchEvent {
        TouchEvent::Pressed { id, x: at.x, y: at.y }
    }

    fn active(mode: ControlMode) -> (CommandFusionEngine, PilotConfig, RecordingDrone) {
        let config = PilotConfig::default();
        let mut engine = CommandFusionEngine::new(mode, &config).unwrap();
        engine.start_session().unwrap();
        (engine, config, RecordingDrone::new())
    }

    fn expect_command(outcome: TickOutcome) -> AxisCommand {
        match outcome {
            TickOutcome::Command(command) => command,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_touch_then_release() {
        let (mut engine, config, drone) = active(ControlMode::Flow);
        let frame = SensorFrame::new();
        let forward = zone_center(&config, ControlMode::Flow, Direction::Forward);

        engine.handle_touch(press(1, forward), &drone);
        let command = expect_command(engine.tick(&frame, &drone));
        assert_eq!(command.pitch(), 50);
        assert!(command.movement());
        assert_eq!(drone.piloting(), command);

        engine.handle_touch(TouchEvent::Released { id: 1 }, &drone);
        let command = expect_command(engine.tick(&frame, &drone));
        assert_eq!(command.pitch(), 0);
        assert!(!command.movement());
        assert!(command.is_neutral());
    }

    #[test]
    fn test_every_flow_zone() {
        let cases = [
            (Direction::Forward, Axis::Pitch, 50),
            (Direction::Backward, Axis::Pitch, -50),
            (Direction::Right, Axis::Roll, 50),
            (Direction::Left, Axis::Roll, -50),
            (Direction::Up, Axis::Gaz, 50),
            (Direction::Down, Axis::Gaz, -50),
            (Direction::TurnRight, Axis::Yaw, 50),
            (Direction::TurnLeft, Axis::Yaw, -50),
        ];
        for (direction, axis, expected) in cases {
            let (mut engine, config, drone) = active(ControlMode::Flow);
            engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, direction)), &drone);
            let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
            assert_eq!(command.axis(axis), expected, "{:?}", direction);
            assert_eq!(command.movement(), axis.uses_movement_flag(), "{:?}", direction);
        }
    }

    #[test]
    fn test_diagonal_multi_touch() {
        let (mut engine, config, drone) = active(ControlMode::Flow);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, Direction::Forward)), &drone);
        engine.handle_touch(press(2, zone_center(&config, ControlMode::Flow, Direction::Right)), &drone);
        engine.handle_touch(press(3, zone_center(&config, ControlMode::Flow, Direction::Up)), &drone);
        let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert_eq!((command.pitch(), command.roll(), command.gaz()), (50, 50, 50));
        assert_eq!(engine.directions().len(), 3);
    }

    #[test]
    fn test_opposed_touches_later_direction_wins() {
        let (mut engine, config, drone) = active(ControlMode::Flow);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, Direction::Forward)), &drone);
        engine.handle_touch(press(2, zone_center(&config, ControlMode::Flow, Direction::Backward)), &drone);
        let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert_eq!(command.pitch(), -50);
    }

    #[test]
    fn test_identical_input_is_idempotent() {
        let (mut engine, config, drone) = active(ControlMode::Flow);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, Direction::Left)), &drone);
        engine.handle_touch(press(2, zone_center(&config, ControlMode::Flow, Direction::Down)), &drone);
        let first = expect_command(engine.tick(&SensorFrame::new(), &drone));
        let second = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert_eq!(first, second);
    }

    #[test]
    fn test_released_axis_returns_exactly_to_zero() {
        let (mut engine, config, drone) = active(ControlMode::Flow);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, Direction::Up)), &drone);
        engine.handle_touch(press(2, zone_center(&config, ControlMode::Flow, Direction::TurnLeft)), &drone);
        let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert_eq!((command.gaz(), command.yaw()), (50, -50));

        engine.handle_touch(TouchEvent::Released { id: 2 }, &drone);
        let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert_eq!((command.gaz(), command.yaw()), (50, 0));
    }

    #[test]
    fn test_every_tick_emits_even_when_neutral() {
        let (mut engine, _config, drone) = active(ControlMode::Flow);
        for _ in 0..3 {
            engine.tick(&SensorFrame::new(), &drone);
        }
        assert_eq!(drone.count(DroneCall::Pitch(0)), 3);
        assert_eq!(drone.count(DroneCall::Flag(false)), 3);
        assert_eq!(engine.tick_count(), 3);
    }

    #[test]
    fn test_cancel_clears_immediately() {
        let (mut engine, config, drone) = active(ControlMode::Flow);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, Direction::Forward)), &drone);
        engine.tick(&SensorFrame::new(), &drone);
        drone.clear_calls();

        let command = engine.handle_touch(TouchEvent::Cancelled, &drone).unwrap();
        assert!(command.is_neutral());
        assert!(engine.pointers().is_empty());
        assert!(engine.directions().is_empty());
        assert_eq!(drone.calls().len(), 5);
        assert!(drone.piloting().is_neutral());
    }

    #[test]
    fn test_tilt_is_proportional_in_gsensor_mode() {
        let (mut engine, _config, drone) = active(ControlMode::GSensor);
        let frame = SensorFrame::new().with_tilt(TiltSample::new(-0.5, 0.0, 0.0));
        let command = expect_command(engine.tick(&frame, &drone));
        assert_eq!(engine.directions(), DirectionSet::from_iter([Direction::Forward]));
        assert_eq!(command.pitch(), 25);
        assert!(command.movement());

        let frame = SensorFrame::new().with_tilt(TiltSample::new(0.0, 0.8, -1.0));
        let command = expect_command(engine.tick(&frame, &drone));
        assert_eq!((command.pitch(), command.roll()), (0, 40));
    }

    #[test]
    fn test_tilt_inside_deadband_leaves_axes_neutral() {
        let (mut engine, _config, drone) = active(ControlMode::GSensor);
        let frame = SensorFrame::new().with_tilt(TiltSample::new(-0.15, 0.1, -1.0));
        let command = expect_command(engine.tick(&frame, &drone));
        assert!(command.is_neutral());
    }

    #[test]
    fn test_gsensor_touch_only_drives_altitude() {
        let (mut engine, config, drone) = active(ControlMode::GSensor);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::GSensor, Direction::Up)), &drone);
        // Where Forward sits in Flow mode; no zone here in GSensor mode
        engine.handle_touch(press(2, zone_center(&config, ControlMode::Flow, Direction::Forward)), &drone);
        let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert_eq!(command.gaz(), 50);
        assert_eq!(command.pitch(), 0);
        assert!(!command.movement());
    }

    #[test]
    fn test_vertical_spike_lands_and_clears() {
        let (mut engine, config, drone) = active(ControlMode::GSensor);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::GSensor, Direction::Up)), &drone);
        let frame = SensorFrame::new()
            .with_tilt(TiltSample::new(-0.9, 0.5, 3.4))
            .with_heading(90.0)
            .with_gesture(45.0);
        drone.clear_calls();

        assert_eq!(engine.tick(&frame, &drone), TickOutcome::EmergencyLand);
        assert_eq!(drone.calls(), vec![DroneCall::Land]);
        assert!(engine.pointers().is_empty());
        assert!(engine.directions().is_empty());
        assert_eq!(engine.emergency_land_count(), 1);

        // The pointer is gone, so nothing persists on the next calm tick
        let calm = SensorFrame::new().with_tilt(TiltSample::new(0.0, 0.0, -1.0));
        let command = expect_command(engine.tick(&calm, &drone));
        assert!(command.is_neutral());
    }

    #[test]
    fn test_flow_mode_ignores_sensors() {
        let (mut engine, _config, drone) = active(ControlMode::Flow);
        let frame = SensorFrame::new()
            .with_tilt(TiltSample::new(-0.9, 0.9, 5.0))
            .with_heading(120.0);
        let command = expect_command(engine.tick(&frame, &drone));
        assert!(command.is_neutral());
        assert_eq!(drone.count(DroneCall::Land), 0);
    }

    #[test]
    fn test_heading_turn_drives_yaw() {
        let (mut engine, _config, drone) = active(ControlMode::GSensor);
        for _ in 0..10 {
            let command = expect_command(engine.tick(&SensorFrame::new().with_heading(0.0), &drone));
            assert_eq!(command.yaw(), 0);
        }
        let command = expect_command(engine.tick(&SensorFrame::new().with_heading(40.0), &drone));
        assert!(engine.directions().contains(Direction::Turn));
        assert_eq!(command.yaw(), 40);
        assert!(!command.movement());
    }

    #[test]
    fn test_heading_beats_gesture_in_same_tick() {
        let (mut engine, _config, drone) = active(ControlMode::GSensor);
        for _ in 0..10 {
            engine.tick(&SensorFrame::new().with_heading(200.0).with_gesture(0.0), &drone);
        }
        let frame = SensorFrame::new().with_heading(170.0).with_gesture(90.0);
        let command = expect_command(engine.tick(&frame, &drone));
        assert_eq!(command.yaw(), -30);
    }

    #[test]
    fn test_large_turn_is_saturated() {
        let (mut engine, _config, drone) = active(ControlMode::GSensor);
        for angle in [0.0, 0.0, 0.0, 0.0, 0.0] {
            engine.tick(&SensorFrame::new().with_gesture(angle), &drone);
        }
        let command = expect_command(engine.tick(&SensorFrame::new().with_gesture(170.0), &drone));
        assert_eq!(command.yaw(), 100);
    }

    #[test]
    fn test_missing_sensors_contribute_nothing() {
        let (mut engine, _config, drone) = active(ControlMode::GSensor);
        let frame = SensorFrame::new().with_tilt(TiltSample::new(-0.6, 0.0, -1.0));
        assert_eq!(expect_command(engine.tick(&frame, &drone)).pitch(), 30);
        let command = expect_command(engine.tick(&SensorFrame::new(), &drone));
        assert!(command.is_neutral());
    }

    #[test]
    fn test_commands_stay_in_range() {
        let (mut engine, config, drone) = active(ControlMode::GSensor);
        engine.handle_touch(press(1, zone_center(&config, ControlMode::GSensor, Direction::Down)), &drone);
        let mut x = -2.9;
        let mut heading = 0.0;
        for step in 0..200 {
            let frame = SensorFrame::new()
                .with_tilt(TiltSample::new(x, -x * 0.7, -1.0))
                .with_heading(heading)
                .with_gesture((step as f64 * 37.0) % 360.0);
            if let TickOutcome::Command(command) = engine.tick(&frame, &drone) {
                for axis in Axis::ALL {
                    assert!((-100..=100).contains(&command.axis(axis)));
                }
            }
            x = if x > 2.9 { -2.9 } else { x + 0.13 };
            heading = (heading + 53.0) % 360.0;
        }
    }

    #[test]
    fn test_lifecycle() {
        let config = PilotConfig::default();
        let drone = RecordingDrone::new();
        let mut engine = CommandFusionEngine::new(ControlMode::Flow, &config).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.tick(&SensorFrame::new(), &drone), TickOutcome::Inactive);
        assert_eq!(engine.request_disconnect(&drone), Err(PilotError::NotActive));
        assert!(drone.calls().is_empty());

        engine.start_session().unwrap();
        assert_eq!(engine.start_session(), Err(PilotError::AlreadyActive));

        engine.handle_touch(press(1, zone_center(&config, ControlMode::Flow, Direction::Right)), &drone);
        engine.tick(&SensorFrame::new(), &drone);
        drone.clear_calls();

        engine.request_disconnect(&drone).unwrap();
        assert_eq!(engine.state(), EngineState::Disconnecting);
        assert!(drone.piloting().is_neutral());
        assert!(engine.pointers().is_empty());

        let calls = drone.calls().len();
        assert_eq!(engine.tick(&SensorFrame::new(), &drone), TickOutcome::Inactive);
        assert!(engine.handle_touch(TouchEvent::Cancelled, &drone).is_none());
        assert_eq!(drone.calls().len(), calls);
        assert!(matches!(engine.start_session(), Err(PilotError::InvalidState(_))));
        engine.request_disconnect(&drone).unwrap();
    }

    #[test]
    fn test_connection_lost_stops_ticking() {
        let (mut engine, _config, drone) = active(ControlMode::Flow);
        engine.connection_lost();
        assert_eq!(engine.state(), EngineState::Disconnecting);
        assert_eq!(engine.tick(&SensorFrame::new(), &drone), TickOutcome::Inactive);
        assert!(drone.calls().is_empty());
    }

    #[test]
    fn test_invalid_lag_rejected_at_construction() {
        let config = PilotConfig {
            gesture_lag: 25,
            ..PilotConfig::default()
        };
        assert!(matches!(
            CommandFusionEngine::new(ControlMode::GSensor, &config),
            Err(PilotError::InvalidConfig(_))
        ));

        let config = PilotConfig {
            heading_lag: 8,
            ring_capacity: 8,
            ..PilotConfig::default()
        };
        assert!(CommandFusionEngine::new(ControlMode::Flow, &config).is_err());
    }
}
