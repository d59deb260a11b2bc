use serde::{Deserialize, Serialize};

use crate::drone::DroneControl;
use crate::types::Axis;

/// On-screen button of the discrete control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadButton {
    GazUp,
    GazDown,
    YawLeft,
    YawRight,
    RollLeft,
    RollRight,
    PitchForward,
    PitchBack,
}

impl PadButton {
    fn axis_and_sign(self) -> (Axis, i8) {
        match self {
            PadButton::GazUp => (Axis::Gaz, 1),
            PadButton::GazDown => (Axis::Gaz, -1),
            PadButton::YawLeft => (Axis::Yaw, -1),
            PadButton::YawRight => (Axis::Yaw, 1),
            PadButton::RollLeft => (Axis::Roll, -1),
            PadButton::RollRight => (Axis::Roll, 1),
            PadButton::PitchForward => (Axis::Pitch, 1),
            PadButton::PitchBack => (Axis::Pitch, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "button", rename_all = "snake_case")]
pub enum ButtonEvent {
    Down(PadButton),
    Up(PadButton),
}

/// Discrete button surface: each press and release goes straight to the drone
#[derive(Debug, Clone)]
pub struct ButtonPad {
    speed: i8,
}

impl ButtonPad {
    pub fn new(speed: i8) -> Self {
        ButtonPad {
            speed: speed.clamp(0, 100),
        }
    }

    pub fn handle<D: DroneControl + ?Sized>(&self, event: ButtonEvent, drone: &D) {
        match event {
            ButtonEvent::Down(button) => self.press(button, drone),
            ButtonEvent::Up(button) => self.release(button, drone),
        }
    }

    pub fn press<D: DroneControl + ?Sized>(&self, button: PadButton, drone: &D) {
        let (axis, sign) = button.axis_and_sign();
        log::debug!("button down {:?}", button);
        Self::drive(axis, sign * self.speed, drone);
    }

    pub fn release<D: DroneControl + ?Sized>(&self, button: PadButton, drone: &D) {
        let (axis, _) = button.axis_and_sign();
        log::debug!("button up {:?}", button);
        Self::drive(axis, 0, drone);
    }

    fn drive<D: DroneControl + ?Sized>(axis: Axis, value: i8, drone: &D) {
        if axis.uses_movement_flag() {
            drone.set_flag(value != 0);
        }
        match axis {
            Axis::Pitch => drone.set_pitch(value),
            Axis::Roll => drone.set_roll(value),
            Axis::Yaw => drone.set_yaw(value),
            Axis::Gaz => drone.set_gaz(value),
        }
    }
}

impl Default for ButtonPad {
    fn default() -> Self {
        Self::new(50)
    }
}
