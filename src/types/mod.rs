pub mod command;

pub use command::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic flight direction requested by a control surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    TurnLeft,
    TurnRight,
    /// Sensor-derived turn, magnitude carried by the turn detector
    Turn,
}

impl Direction {
    /// Application order used by the fusion engine
    pub const ALL: [Direction; 9] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
        Direction::TurnRight,
        Direction::TurnLeft,
        Direction::Turn,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Axis this direction drives
    pub fn axis(self) -> Axis {
        match self {
            Direction::Forward | Direction::Backward => Axis::Pitch,
            Direction::Left | Direction::Right => Axis::Roll,
            Direction::Up | Direction::Down => Axis::Gaz,
            Direction::TurnLeft | Direction::TurnRight | Direction::Turn => Axis::Yaw,
        }
    }

    /// Sign of the discrete command for this direction; `Turn` is signed by its magnitude
    pub fn sign(self) -> i8 {
        match self {
            Direction::Forward | Direction::Right | Direction::Up | Direction::TurnRight => 1,
            Direction::Backward | Direction::Left | Direction::Down | Direction::TurnLeft => -1,
            Direction::Turn => 0,
        }
    }
}

/// The four controllable axes of the vehicle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Pitch,
    Roll,
    Yaw,
    Gaz,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Pitch, Axis::Roll, Axis::Gaz, Axis::Yaw];

    /// Opposed directions whose absence must return this axis to zero
    pub fn directions(self) -> DirectionSet {
        match self {
            Axis::Pitch => DirectionSet::from_iter([Direction::Forward, Direction::Backward]),
            Axis::Roll => DirectionSet::from_iter([Direction::Right, Direction::Left]),
            Axis::Gaz => DirectionSet::from_iter([Direction::Down, Direction::Up]),
            Axis::Yaw => DirectionSet::from_iter([
                Direction::TurnLeft,
                Direction::TurnRight,
                Direction::Turn,
            ]),
        }
    }

    /// Whether commanding this axis requires the roll/pitch enable flag
    pub fn uses_movement_flag(self) -> bool {
        matches!(self, Axis::Pitch | Axis::Roll)
    }
}

/// Set of simultaneously active directions, rebuilt every tick
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Direction>", from = "Vec<Direction>")]
pub struct DirectionSet(u16);

impl DirectionSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    pub fn remove(&mut self, direction: Direction) {
        self.0 &= !direction.bit();
    }

    pub fn contains(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(&self, other: DirectionSet) -> DirectionSet {
        DirectionSet(self.0 | other.0)
    }

    pub fn extend(&mut self, other: DirectionSet) {
        self.0 |= other.0;
    }

    /// Iterates in `Direction::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = DirectionSet::new();
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}

impl From<Vec<Direction>> for DirectionSet {
    fn from(directions: Vec<Direction>) -> Self {
        directions.into_iter().collect()
    }
}

impl From<DirectionSet> for Vec<Direction> {
    fn from(set: DirectionSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for DirectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Control surface wired into the fusion engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Touch zones for every direction, fixed-speed commands
    Flow,
    /// Up/down touch zones plus tilt, compass heading and rotation gesture
    GSensor,
    /// Press/release buttons driving the vehicle directly, no scheduler
    Buttons,
}

impl ControlMode {
    /// Whether the fusion engine runs on a periodic tick in this mode
    pub fn is_ticked(self) -> bool {
        !matches!(self, ControlMode::Buttons)
    }
}

impl std::str::FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flow" => Ok(ControlMode::Flow),
            "gsensor" | "g-sensor" => Ok(ControlMode::GSensor),
            "buttons" => Ok(ControlMode::Buttons),
            other => Err(format!("unknown control mode '{}'", other)),
        }
    }
}
