use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::buttons::{ButtonEvent, PadButton};
use crate::config::PilotConfig;
use crate::drone::DroneControl;
use crate::error::{PilotError, PilotResult};
use crate::sensors::SharedSensors;
use crate::session::ControlSession;
use crate::tilt::TiltSample;
use crate::touch::TouchEvent;
use crate::types::{ControlMode, Direction};

/// One scripted input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScriptInput {
    Touch(TouchEvent),
    Button(ButtonEvent),
    Tilt(TiltSample),
    ClearTilt,
    Heading(f64),
    Gesture(Option<f64>),
    TakeOffOrLand,
    Emergency,
}

impl ScriptInput {
    /// Feed this input into a running session
    pub fn apply<D: DroneControl>(
        &self,
        session: &ControlSession<D>,
        sensors: &SharedSensors,
    ) -> PilotResult<()> {
        match *self {
            ScriptInput::Touch(event) => session.touch(event)?,
            ScriptInput::Button(event) => session.button(event)?,
            ScriptInput::Tilt(sample) => sensors.set_tilt(sample),
            ScriptInput::ClearTilt => sensors.clear(),
            ScriptInput::Heading(deg) => sensors.set_heading(deg),
            ScriptInput::Gesture(angle) => sensors.set_gesture(angle),
            ScriptInput::TakeOffOrLand => {
                session.take_off_or_land()?;
            }
            ScriptInput::Emergency => session.emergency(),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    /// Offset from session start
    pub at_ms: u64,
    pub input: ScriptInput,
}

impl ScriptEvent {
    pub fn new(at_ms: u64, input: ScriptInput) -> Self {
        ScriptEvent { at_ms, input }
    }
}

/// Timed input sequence replayed by the simulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputScript {
    pub events: Vec<ScriptEvent>,
}

impl InputScript {
    pub fn load<P: AsRef<Path>>(path: P) -> PilotResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PilotError::ConfigIo(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| PilotError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Offset of the last event
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.events.iter().map(|e| e.at_ms).max().unwrap_or(0))
    }

    /// Built-in flight for `mode` using the configured zone layout
    pub fn demo(mode: ControlMode, config: &PilotConfig) -> Self {
        let press = |id: u64, direction: Direction| {
            let (x, y) = config
                .zones(mode)
                .iter()
                .find(|z| z.direction == direction)
                .map(|z| (z.center().x, z.center().y))
                .unwrap_or((0.0, 0.0));
            ScriptInput::Touch(TouchEvent::Pressed { id, x, y })
        };
        let release = |id: u64| ScriptInput::Touch(TouchEvent::Released { id });

        let mut events = vec![ScriptEvent::new(200, ScriptInput::TakeOffOrLand)];
        match mode {
            ControlMode::Flow => events.extend([
                ScriptEvent::new(1_000, press(1, Direction::Up)),
                ScriptEvent::new(1_500, release(1)),
                ScriptEvent::new(2_000, press(2, Direction::Forward)),
                ScriptEvent::new(2_200, press(3, Direction::TurnRight)),
                ScriptEvent::new(3_000, release(3)),
                ScriptEvent::new(3_500, release(2)),
                ScriptEvent::new(4_000, press(4, Direction::Left)),
                ScriptEvent::new(4_500, ScriptInput::Touch(TouchEvent::Cancelled)),
                ScriptEvent::new(5_000, ScriptInput::TakeOffOrLand),
            ]),
            ControlMode::GSensor => {
                events.push(ScriptEvent::new(1_000, press(1, Direction::Up)));
                events.push(ScriptEvent::new(1_500, release(1)));
                events.push(ScriptEvent::new(
                    2_000,
                    ScriptInput::Tilt(TiltSample::new(-0.5, 0.3, -1.0)),
                ));
                // Slow compass sweep, 5° per 100 ms
                for step in 0..10u64 {
                    events.push(ScriptEvent::new(
                        2_500 + step * 100,
                        ScriptInput::Heading(step as f64 * 5.0),
                    ));
                }
                events.push(ScriptEvent::new(3_500, ScriptInput::ClearTilt));
                events.push(ScriptEvent::new(
                    4_000,
                    ScriptInput::Tilt(TiltSample::new(0.0, 0.0, 3.5)),
                ));
                // Vertical spike lands the vehicle, no explicit landing needed
                events.push(ScriptEvent::new(4_200, ScriptInput::ClearTilt));
            }
            ControlMode::Buttons => events.extend([
                ScriptEvent::new(1_000, ScriptInput::Button(ButtonEvent::Down(PadButton::GazUp))),
                ScriptEvent::new(1_500, ScriptInput::Button(ButtonEvent::Up(PadButton::GazUp))),
                ScriptEvent::new(
                    2_000,
                    ScriptInput::Button(ButtonEvent::Down(PadButton::PitchForward)),
                ),
                ScriptEvent::new(
                    3_000,
                    ScriptInput::Button(ButtonEvent::Up(PadButton::PitchForward)),
                ),
                ScriptEvent::new(5_000, ScriptInput::TakeOffOrLand),
            ]),
        }
        InputScript { events }
    }
}

/// Releases script events as their offsets come due
#[derive(Debug, Clone)]
pub struct ScriptPlayer {
    events: Vec<ScriptEvent>,
    cursor: usize,
}

impl ScriptPlayer {
    pub fn new(script: InputScript) -> Self {
        let mut events = script.events;
        // Stable: events sharing an offset keep file order
        events.sort_by_key(|e| e.at_ms);
        ScriptPlayer { events, cursor: 0 }
    }

    /// Events with `at_ms <= elapsed` not yet returned
    pub fn due(&mut self, elapsed: Duration) -> &[ScriptEvent] {
        let elapsed_ms = elapsed.as_millis() as u64;
        let start = self.cursor;
        while self.cursor < self.events.len() && self.events[self.cursor].at_ms <= elapsed_ms {
            self.cursor += 1;
        }
        &self.events[start..self.cursor]
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }
}
