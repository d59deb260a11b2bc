use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Direction, DirectionSet};

/// Pointer lifecycle event from the host UI
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TouchEvent {
    Pressed { id: u64, x: f32, y: f32 },
    Moved { id: u64, x: f32, y: f32 },
    Released { id: u64 },
    /// The system took the touches away; every pointer is dropped
    Cancelled,
}

/// Active pointers and their last known positions
#[derive(Debug, Clone, Default)]
pub struct PointerSet {
    pointers: HashMap<u64, Vec2>,
}

impl PointerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: TouchEvent) {
        match event {
            TouchEvent::Pressed { id, x, y } | TouchEvent::Moved { id, x, y } => {
                self.pointers.insert(id, Vec2::new(x, y));
            }
            TouchEvent::Released { id } => {
                self.pointers.remove(&id);
            }
            TouchEvent::Cancelled => self.pointers.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.pointers.clear();
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.pointers.values().copied()
    }
}

/// Named screen rectangle that yields a direction while touched
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub direction: Direction,
    /// Top-left corner, screen points
    pub min: Vec2,
    /// Bottom-right corner, exclusive
    pub max: Vec2,
}

impl Zone {
    pub fn new(direction: Direction, x: f32, y: f32, width: f32, height: f32) -> Self {
        Zone {
            direction,
            min: Vec2::new(x, y),
            max: Vec2::new(x + width, y + height),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.max.x > self.min.x && self.max.y > self.min.y)
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// Maps the active pointers to the directions of every zone they touch
#[derive(Debug, Clone)]
pub struct TouchZoneClassifier {
    zones: Vec<Zone>,
}

impl TouchZoneClassifier {
    pub fn new(zones: Vec<Zone>) -> Self {
        TouchZoneClassifier { zones }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn classify(&self, pointers: &PointerSet) -> DirectionSet {
        let mut directions = DirectionSet::new();
        for position in pointers.positions() {
            for zone in &self.zones {
                if zone.contains(position) {
                    directions.insert(zone.direction);
                }
            }
        }
        directions
    }
}
