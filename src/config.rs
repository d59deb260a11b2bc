use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PilotError, PilotResult};
use crate::touch::Zone;
use crate::types::{ControlMode, Direction};

/// Tunables for the control session
///
/// Every field has a default so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// Tick period in Flow mode (20 Hz)
    pub flow_tick_ms: u64,
    /// Tick period in GSensor mode (half the 100 ms accelerometer interval)
    pub gsensor_tick_ms: u64,
    pub ring_capacity: usize,
    pub heading_lag: usize,
    pub gesture_lag: usize,
    pub turn_threshold_deg: f64,
    pub tilt_deadband_g: f64,
    pub emergency_land_g: f64,
    /// Axis units per g of tilt
    pub tilt_gain: f64,
    /// Axis value used by touch zones and buttons
    pub discrete_speed: i8,
    /// `None` waits for the drone forever
    pub disconnect_timeout_ms: Option<u64>,
    pub event_channel_capacity: usize,
    pub flow_zones: Vec<Zone>,
    pub gsensor_zones: Vec<Zone>,
}

impl Default for PilotConfig {
    fn default() -> Self {
        PilotConfig {
            flow_tick_ms: 50,
            gsensor_tick_ms: 50,
            ring_capacity: 20,
            heading_lag: 10,
            gesture_lag: 5,
            turn_threshold_deg: 15.0,
            tilt_deadband_g: 0.2,
            emergency_land_g: 3.0,
            tilt_gain: 50.0,
            discrete_speed: 50,
            disconnect_timeout_ms: Some(10_000),
            event_channel_capacity: 64,
            flow_zones: default_flow_zones(),
            gsensor_zones: default_gsensor_zones(),
        }
    }
}

// 375x667 portrait layout: translation pad bottom-left, altitude/yaw pad bottom-right
fn default_flow_zones() -> Vec<Zone> {
    vec![
        Zone::new(Direction::Forward, 60.0, 430.0, 60.0, 60.0),
        Zone::new(Direction::Backward, 60.0, 530.0, 60.0, 60.0),
        Zone::new(Direction::Left, 0.0, 480.0, 60.0, 60.0),
        Zone::new(Direction::Right, 120.0, 480.0, 60.0, 60.0),
        Zone::new(Direction::Up, 255.0, 430.0, 60.0, 60.0),
        Zone::new(Direction::Down, 255.0, 530.0, 60.0, 60.0),
        Zone::new(Direction::TurnLeft, 195.0, 480.0, 60.0, 60.0),
        Zone::new(Direction::TurnRight, 315.0, 480.0, 60.0, 60.0),
    ]
}

fn default_gsensor_zones() -> Vec<Zone> {
    vec![
        Zone::new(Direction::Up, 255.0, 430.0, 60.0, 60.0),
        Zone::new(Direction::Down, 255.0, 530.0, 60.0, 60.0),
    ]
}

impl PilotConfig {
    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> PilotResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PilotError::ConfigIo(format!("{}: {}", path.display(), e)))?;
        let config: PilotConfig = serde_json::from_str(&text)
            .map_err(|e| PilotError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PilotResult<()> {
        if self.flow_tick_ms == 0 || self.gsensor_tick_ms == 0 {
            return Err(PilotError::InvalidConfig(
                "tick intervals must be non-zero".to_string(),
            ));
        }
        if self.ring_capacity == 0 {
            return Err(PilotError::InvalidConfig(
                "ring_capacity must be non-zero".to_string(),
            ));
        }
        for (name, lag) in [("heading_lag", self.heading_lag), ("gesture_lag", self.gesture_lag)] {
            if lag >= self.ring_capacity {
                return Err(PilotError::InvalidConfig(format!(
                    "{} ({}) must be smaller than ring_capacity ({})",
                    name, lag, self.ring_capacity
                )));
            }
        }
        for (name, value) in [
            ("turn_threshold_deg", self.turn_threshold_deg),
            ("tilt_deadband_g", self.tilt_deadband_g),
            ("emergency_land_g", self.emergency_land_g),
            ("tilt_gain", self.tilt_gain),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PilotError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.discrete_speed <= 0 || self.discrete_speed > 100 {
            return Err(PilotError::InvalidConfig(format!(
                "discrete_speed must be in 1..=100, got {}",
                self.discrete_speed
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(PilotError::InvalidConfig(
                "event_channel_capacity must be non-zero".to_string(),
            ));
        }
        for zone in self.flow_zones.iter().chain(self.gsensor_zones.iter()) {
            if zone.is_degenerate() {
                return Err(PilotError::InvalidConfig(format!(
                    "zone for {:?} has no area",
                    zone.direction
                )));
            }
        }
        if let Some(zone) = self
            .gsensor_zones
            .iter()
            .find(|z| !matches!(z.direction, Direction::Up | Direction::Down))
        {
            return Err(PilotError::InvalidConfig(format!(
                "gsensor zones may only map up/down, found {:?}",
                zone.direction
            )));
        }
        Ok(())
    }

    /// Scheduler period; `None` for modes that are not ticked
    pub fn tick_interval(&self, mode: ControlMode) -> Option<Duration> {
        match mode {
            ControlMode::Flow => Some(Duration::from_millis(self.flow_tick_ms)),
            ControlMode::GSensor => Some(Duration::from_millis(self.gsensor_tick_ms)),
            ControlMode::Buttons => None,
        }
    }

    pub fn zones(&self, mode: ControlMode) -> &[Zone] {
        match mode {
            ControlMode::Flow => &self.flow_zones,
            ControlMode::GSensor => &self.gsensor_zones,
            ControlMode::Buttons => &[],
        }
    }

    pub fn disconnect_timeout(&self) -> Option<Duration> {
        self.disconnect_timeout_ms.map(Duration::from_millis)
    }
}
