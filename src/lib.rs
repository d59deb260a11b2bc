// Minidrone pilot library
// Fuses touch, tilt, compass and gesture input into bounded piloting commands

pub mod buttons;
pub mod config;
pub mod drone;
pub mod engine;
pub mod error;
pub mod live_status;
pub mod ring_buffer;
pub mod script;
pub mod sensors;
pub mod session;
pub mod tilt;
pub mod touch;
pub mod turn;
pub mod types;

pub use config::PilotConfig;
pub use drone::{ConnectionState, DroneControl, DroneEvent, FlyingState, RecordingDrone};
pub use engine::{CommandFusionEngine, EngineState, TickOutcome};
pub use error::{PilotError, PilotResult};
pub use sensors::{SensorFrame, SensorSource, SharedSensors};
pub use session::{ControlSession, FlightStatus, PilotAction};
pub use types::{AxisCommand, ControlMode, Direction, DirectionSet};
