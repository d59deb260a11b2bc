use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::types::{clamp_axis, Direction, DirectionSet};

/// Accelerometer sample in g-units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TiltSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TiltSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Result of classifying one tilt sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltReading {
    /// Subset of {Forward, Backward, Left, Right}; empty on emergency land
    pub directions: DirectionSet,
    /// Proportional pitch, already clamped (tilting the top edge down is positive)
    pub pitch: i8,
    /// Proportional roll, already clamped
    pub roll: i8,
    /// Vertical spike beyond the land threshold
    pub emergency_land: bool,
}

/// Tilt-to-direction mapping with deadband and spike-triggered landing
#[derive(Debug, Clone)]
pub struct TiltClassifier {
    deadband: f64,
    land_threshold: f64,
    gain: f64,
}

impl TiltClassifier {
    pub fn new(deadband: f64, land_threshold: f64, gain: f64) -> Self {
        TiltClassifier {
            deadband,
            land_threshold,
            gain,
        }
    }

    pub fn from_config(config: &PilotConfig) -> Self {
        Self::new(config.tilt_deadband_g, config.emergency_land_g, config.tilt_gain)
    }

    pub fn classify(&self, sample: &TiltSample) -> TiltReading {
        if sample.z.abs() > self.land_threshold {
            return TiltReading {
                directions: DirectionSet::new(),
                pitch: 0,
                roll: 0,
                emergency_land: true,
            };
        }

        let mut directions = DirectionSet::new();
        if sample.x < -self.deadband {
            directions.insert(Direction::Forward);
        }
        if sample.x > self.deadband {
            directions.insert(Direction::Backward);
        }
        if sample.y < -self.deadband {
            directions.insert(Direction::Left);
        }
        if sample.y > self.deadband {
            directions.insert(Direction::Right);
        }

        TiltReading {
            directions,
            pitch: clamp_axis(sample.x * -self.gain),
            roll: clamp_axis(sample.y * self.gain),
            emergency_land: false,
        }
    }
}

impl Default for TiltClassifier {
    fn default() -> Self {
        Self::from_config(&PilotConfig::default())
    }
}
