use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::drone::{ConnectionState, FlyingState};
use crate::engine::EngineState;
use crate::session::{EngineStats, FlightStatus, PilotAction};
use crate::types::{ControlMode, Direction};

/// Periodic snapshot written next to the session output
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_id: String,
    pub mode: ControlMode,
    pub uptime_seconds: u64,
    pub engine_state: EngineState,
    pub ticks: u64,
    pub emergency_lands: u64,
    // Last command sent
    pub pitch: i8,
    pub roll: i8,
    pub yaw: i8,
    pub gaz: i8,
    pub movement: bool,
    pub directions: Vec<Direction>,
    pub turn_deg: f64,
    // Vehicle
    pub connection: ConnectionState,
    pub flying: Option<FlyingState>,
    pub battery_percent: Option<u8>,
    pub available_action: Option<PilotAction>,
}

impl LiveStatus {
    pub fn new(session_id: &str, mode: ControlMode) -> Self {
        Self {
            timestamp: current_timestamp(),
            session_id: session_id.to_string(),
            mode,
            uptime_seconds: 0,
            engine_state: EngineState::Idle,
            ticks: 0,
            emergency_lands: 0,
            pitch: 0,
            roll: 0,
            yaw: 0,
            gaz: 0,
            movement: false,
            directions: Vec::new(),
            turn_deg: 0.0,
            connection: ConnectionState::Stopped,
            flying: None,
            battery_percent: None,
            available_action: None,
        }
    }

    pub fn with_engine(mut self, stats: &EngineStats) -> Self {
        self.engine_state = stats.state;
        self.ticks = stats.ticks;
        self.emergency_lands = stats.emergency_lands;
        self.pitch = stats.command.pitch();
        self.roll = stats.command.roll();
        self.yaw = stats.command.yaw();
        self.gaz = stats.command.gaz();
        self.movement = stats.command.movement();
        self.directions = stats.directions.iter().collect();
        self.turn_deg = stats.turn_deg;
        self
    }

    pub fn with_flight(mut self, status: &FlightStatus) -> Self {
        self.connection = status.connection;
        self.flying = status.flying;
        self.battery_percent = status.battery_percent;
        self.available_action = status.available_action();
        self
    }

    pub fn with_uptime(mut self, seconds: u64) -> Self {
        self.uptime_seconds = seconds;
        self
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drone::DroneEvent;
    use crate::types::{Axis, AxisCommand, DirectionSet};

    #[test]
    fn test_snapshot_from_session_views() {
        let mut command = AxisCommand::neutral();
        command.set_axis(Axis::Pitch, 50.0);
        command.set_movement(true);
        let stats = EngineStats {
            state: EngineState::Active,
            ticks: 12,
            emergency_lands: 1,
            command,
            directions: DirectionSet::from_iter([Direction::Forward]),
            turn_deg: 0.0,
        };
        let mut flight = FlightStatus::default();
        flight.apply(DroneEvent::ConnectionChanged(ConnectionState::Running));
        flight.apply(DroneEvent::FlyingStateChanged(FlyingState::Hovering));

        let status = LiveStatus::new("session_1", ControlMode::Flow)
            .with_engine(&stats)
            .with_flight(&flight)
            .with_uptime(3);

        assert_eq!(status.pitch, 50);
        assert!(status.movement);
        assert_eq!(status.directions, vec![Direction::Forward]);
        assert_eq!(status.available_action, Some(PilotAction::Land));
        assert_eq!(status.uptime_seconds, 3);
    }

    #[test]
    fn test_save_writes_json() {
        let path = std::env::temp_dir().join(format!(
            "minidrone_pilot_status_{}.json",
            std::process::id()
        ));
        let status = LiveStatus::new("session_2", ControlMode::GSensor);
        status.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let back: LiveStatus = serde_json::from_str(&text).unwrap();
        assert_eq!(back.session_id, "session_2");
        assert_eq!(back.mode, ControlMode::GSensor);
        assert!(text.contains("\"engine_state\": \"idle\""));
        fs::remove_file(&path).unwrap();
    }
}
