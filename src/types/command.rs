use serde::{Deserialize, Serialize};

use super::Axis;

/// Largest magnitude accepted on any axis
pub const AXIS_LIMIT: i8 = 100;

/// Saturate a raw axis value into `[-100, 100]`, truncating toward zero
pub fn clamp_axis(value: f64) -> i8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(-(AXIS_LIMIT as f64), AXIS_LIMIT as f64) as i8
}

/// Four-axis command sent to the vehicle once per tick
///
/// Fields are private so every write goes through the clamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisCommand {
    pitch: i8,
    roll: i8,
    yaw: i8,
    gaz: i8,
    movement: bool,
}

impl AxisCommand {
    /// All axes at zero, movement disabled
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn pitch(&self) -> i8 {
        self.pitch
    }

    pub fn roll(&self) -> i8 {
        self.roll
    }

    pub fn yaw(&self) -> i8 {
        self.yaw
    }

    /// Vertical speed
    pub fn gaz(&self) -> i8 {
        self.gaz
    }

    pub fn movement(&self) -> bool {
        self.movement
    }

    pub fn axis(&self, axis: Axis) -> i8 {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Roll => self.roll,
            Axis::Yaw => self.yaw,
            Axis::Gaz => self.gaz,
        }
    }

    pub fn set_axis(&mut self, axis: Axis, value: f64) {
        let value = clamp_axis(value);
        match axis {
            Axis::Pitch => self.pitch = value,
            Axis::Roll => self.roll = value,
            Axis::Yaw => self.yaw = value,
            Axis::Gaz => self.gaz = value,
        }
    }

    pub fn set_movement(&mut self, movement: bool) {
        self.movement = movement;
    }

    /// Zero an axis and drop the movement flag if the axis depends on it
    pub fn clear_axis(&mut self, axis: Axis) {
        self.set_axis(axis, 0.0);
        if axis.uses_movement_flag() {
            self.movement = false;
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral()
    }
}
