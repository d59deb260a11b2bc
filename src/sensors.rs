use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::tilt::TiltSample;

/// Latest readings available to one tick; a missing field means "no update"
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub tilt: Option<TiltSample>,
    /// Magnetic heading, degrees in `[0, 360)`
    pub heading: Option<f64>,
    /// Angle reported by the circular hand gesture, degrees in `[0, 360)`
    pub gesture: Option<f64>,
}

impl SensorFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tilt(mut self, tilt: TiltSample) -> Self {
        self.tilt = Some(tilt);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading.rem_euclid(360.0));
        self
    }

    pub fn with_gesture(mut self, angle: f64) -> Self {
        self.gesture = Some(angle.rem_euclid(360.0));
        self
    }
}

/// Pulled once per tick by the control session
pub trait SensorSource: Send {
    fn poll(&mut self) -> SensorFrame;
}

impl<F> SensorSource for F
where
    F: FnMut() -> SensorFrame + Send,
{
    fn poll(&mut self) -> SensorFrame {
        self()
    }
}

/// Latest-value store written by sensor callbacks and read by the tick
#[derive(Debug, Clone, Default)]
pub struct SharedSensors {
    latest: Arc<Mutex<SensorFrame>>,
}

impl SharedSensors {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut SensorFrame)) {
        if let Ok(mut frame) = self.latest.lock() {
            f(&mut frame);
        }
    }

    pub fn set_tilt(&self, tilt: TiltSample) {
        self.update(|frame| frame.tilt = Some(tilt));
    }

    pub fn set_heading(&self, heading: f64) {
        self.update(|frame| frame.heading = Some(heading.rem_euclid(360.0)));
    }

    /// `None` when the hand leaves the gesture ring
    pub fn set_gesture(&self, angle: Option<f64>) {
        self.update(|frame| frame.gesture = angle.map(|a| a.rem_euclid(360.0)));
    }

    /// Sensors stopped; ticks see no contribution until they resume
    pub fn clear(&self) {
        self.update(|frame| *frame = SensorFrame::default());
    }

    pub fn snapshot(&self) -> SensorFrame {
        self.latest.lock().map(|frame| *frame).unwrap_or_default()
    }
}

impl SensorSource for SharedSensors {
    fn poll(&mut self) -> SensorFrame {
        self.snapshot()
    }
}
