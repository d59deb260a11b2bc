use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::error::{PilotError, PilotResult};
use crate::ring_buffer::AngleRingBuffer;

/// Which input produced the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSource {
    Heading,
    Gesture,
}

/// Outcome of one turn-detection step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TurnReading {
    /// Signed delta in degrees; zero when below the threshold or without history
    pub magnitude: f64,
    pub source: Option<TurnSource>,
}

impl TurnReading {
    pub fn is_turning(&self) -> bool {
        self.source.is_some()
    }
}

/// Detects deliberate rotations from compass heading and the circular gesture
///
/// Heading wins whenever it yields a turn; the gesture ring is only consulted
/// (and only advanced) on ticks where heading produced nothing.
#[derive(Debug, Clone)]
pub struct TurnDetector {
    heading: AngleRingBuffer,
    gesture: AngleRingBuffer,
    heading_lag: usize,
    gesture_lag: usize,
    threshold_deg: f64,
}

impl TurnDetector {
    /// Both lags must be smaller than `capacity`
    pub fn new(
        capacity: usize,
        heading_lag: usize,
        gesture_lag: usize,
        threshold_deg: f64,
    ) -> PilotResult<Self> {
        if capacity == 0 {
            return Err(PilotError::InvalidConfig(
                "ring_capacity must be non-zero".to_string(),
            ));
        }
        for (name, lag) in [("heading_lag", heading_lag), ("gesture_lag", gesture_lag)] {
            if lag >= capacity {
                return Err(PilotError::InvalidConfig(format!(
                    "{} ({}) must be smaller than ring_capacity ({})",
                    name, lag, capacity
                )));
            }
        }
        Ok(Self::build(capacity, heading_lag, gesture_lag, threshold_deg))
    }

    pub fn from_config(config: &PilotConfig) -> PilotResult<Self> {
        Self::new(
            config.ring_capacity,
            config.heading_lag,
            config.gesture_lag,
            config.turn_threshold_deg,
        )
    }

    fn build(capacity: usize, heading_lag: usize, gesture_lag: usize, threshold_deg: f64) -> Self {
        TurnDetector {
            heading: AngleRingBuffer::new(capacity),
            gesture: AngleRingBuffer::new(capacity),
            heading_lag,
            gesture_lag,
            threshold_deg,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_deg
    }

    pub fn update(&mut self, heading: Option<f64>, gesture: Option<f64>) -> TurnReading {
        if let Some(angle) = heading {
            self.heading.push(angle);
            if let Some(delta) = self.past_threshold(self.heading.delta(self.heading_lag)) {
                log::debug!(
                    "heading turn {:.1}° over {:?}",
                    delta,
                    self.heading.span(self.heading_lag).unwrap_or_default()
                );
                return TurnReading {
                    magnitude: delta,
                    source: Some(TurnSource::Heading),
                };
            }
        }

        if let Some(angle) = gesture {
            self.gesture.push(angle);
            if let Some(delta) = self.past_threshold(self.gesture.delta(self.gesture_lag)) {
                log::debug!(
                    "gesture turn {:.1}° over {:?}",
                    delta,
                    self.gesture.span(self.gesture_lag).unwrap_or_default()
                );
                return TurnReading {
                    magnitude: delta,
                    source: Some(TurnSource::Gesture),
                };
            }
        }

        TurnReading::default()
    }

    fn past_threshold(&self, delta: Option<f64>) -> Option<f64> {
        delta.filter(|d| d.abs() > self.threshold_deg)
    }

    pub fn reset(&mut self) {
        self.heading.reset();
        self.gesture.reset();
    }
}

impl Default for TurnDetector {
    fn default() -> Self {
        let config = PilotConfig::default();
        Self::build(
            config.ring_capacity,
            config.heading_lag,
            config.gesture_lag,
            config.turn_threshold_deg,
        )
    }
}
