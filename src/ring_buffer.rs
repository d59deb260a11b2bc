use std::time::{Duration, Instant};

/// Fold a raw angular difference into `(-180, 180]` degrees
///
/// Inputs are differences of two angles in `[0, 360)`, so one correction is enough.
pub fn normalize_delta(diff: f64) -> f64 {
    if diff <= -180.0 {
        diff + 360.0
    } else if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// One angle reading and when it was pushed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    pub angle: f64,
    pub at: Instant,
}

/// Fixed-capacity ring of angular samples (degrees) with lag-compare deltas
///
/// Slots that were never written in this session read as `None`, so the first
/// `lag` pushes yield "not enough history" instead of a spurious delta
/// against a zero-initialized slot.
#[derive(Debug, Clone)]
pub struct AngleRingBuffer {
    slots: Vec<Option<AngleSample>>,
    cursor: Option<usize>,
}

impl AngleRingBuffer {
    /// Create an empty ring. `capacity` must be non-zero (checked by `PilotConfig::validate`).
    pub fn new(capacity: usize) -> Self {
        AngleRingBuffer {
            slots: vec![None; capacity.max(1)],
            cursor: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Advance the write cursor and overwrite the slot under it
    pub fn push(&mut self, angle: f64) {
        self.push_at(angle, Instant::now());
    }

    pub fn push_at(&mut self, angle: f64, at: Instant) {
        let next = match self.cursor {
            Some(pos) => (pos + 1) % self.slots.len(),
            None => 0,
        };
        self.slots[next] = Some(AngleSample { angle, at });
        self.cursor = Some(next);
    }

    /// Most recently pushed angle
    pub fn latest(&self) -> Option<f64> {
        self.sample(0).map(|s| s.angle)
    }

    /// The sample `lag` slots behind the cursor; `None` if never written
    /// or if `lag` reaches past the ring
    pub fn sample(&self, lag: usize) -> Option<AngleSample> {
        let len = self.slots.len();
        if lag >= len {
            return None;
        }
        let pos = self.cursor?;
        self.slots[(pos + len - lag) % len]
    }

    /// Signed change between the latest sample and the one `lag` slots behind it
    pub fn delta(&self, lag: usize) -> Option<f64> {
        let current = self.sample(0)?;
        let previous = self.sample(lag)?;
        Some(normalize_delta(current.angle - previous.angle))
    }

    /// Time covered by the last `lag` pushes
    pub fn span(&self, lag: usize) -> Option<Duration> {
        let current = self.sample(0)?;
        let previous = self.sample(lag)?;
        Some(current.at.saturating_duration_since(previous.at))
    }

    /// Forget every sample
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normalize_wraparound() {
        assert_abs_diff_eq!(normalize_delta(350.0), -10.0);
        assert_abs_diff_eq!(normalize_delta(-350.0), 10.0);
        assert_abs_diff_eq!(normalize_delta(-180.0), 180.0);
        assert_abs_diff_eq!(normalize_delta(180.0), 180.0);
        assert_abs_diff_eq!(normalize_delta(42.5), 42.5);
    }

    #[test]
    fn test_empty_ring_has_no_delta() {
        let ring = AngleRingBuffer::new(20);
        assert_eq!(ring.delta(0), None);
        assert_eq!(ring.delta(10), None);
        assert_eq!(ring.latest(), None);
    }

    #[test]
    fn test_heading_history_scenario() {
        let mut ring = AngleRingBuffer::new(20);
        for _ in 0..9 {
            ring.push(0.0);
        }
        ring.push(30.0);
        // Ten pushes: the slot ten behind the cursor is still unwritten
        assert_eq!(ring.delta(10), None);

        ring.push(30.0);
        assert_eq!(ring.delta(10), Some(30.0));
    }

    #[test]
    fn test_delta_crosses_north() {
        let mut ring = AngleRingBuffer::new(20);
        ring.push(350.0);
        for _ in 0..4 {
            ring.push(355.0);
        }
        ring.push(10.0);
        assert_abs_diff_eq!(ring.delta(5).unwrap(), 20.0);
    }

    #[test]
    fn test_delta_after_wrap_uses_previous_lap() {
        let mut ring = AngleRingBuffer::new(4);
        for angle in [0.0, 10.0, 20.0, 30.0, 40.0, 50.0] {
            ring.push(angle);
        }
        assert_abs_diff_eq!(ring.delta(3).unwrap(), 30.0);
        assert_abs_diff_eq!(ring.delta(1).unwrap(), 10.0);
        assert_eq!(ring.latest(), Some(50.0));
    }

    #[test]
    fn test_delta_range_for_all_inputs() {
        let capacity = 20;
        for lag in 0..capacity {
            let mut ring = AngleRingBuffer::new(capacity);
            let mut angle = 0.0;
            for step in 0..(3 * capacity) {
                ring.push(angle);
                let written = step + 1;
                match ring.delta(lag) {
                    Some(delta) => {
                        assert!(written > lag);
                        assert!(delta > -180.0 && delta <= 180.0, "delta {}", delta);
                    }
                    None => assert!(written <= lag),
                }
                angle = (angle + 97.3) % 360.0;
            }
        }
    }

    #[test]
    fn test_samples_carry_push_time() {
        let mut ring = AngleRingBuffer::new(5);
        let start = Instant::now();
        ring.push_at(10.0, start);
        ring.push_at(20.0, start + Duration::from_millis(50));
        ring.push_at(40.0, start + Duration::from_millis(100));

        let oldest = ring.sample(2).unwrap();
        assert_eq!(oldest.angle, 10.0);
        assert_eq!(oldest.at, start);
        assert_eq!(ring.span(2), Some(Duration::from_millis(100)));
        assert_eq!(ring.span(3), None);
    }

    #[test]
    fn test_lag_past_capacity_has_no_history() {
        let mut ring = AngleRingBuffer::new(4);
        for angle in [0.0, 10.0, 20.0, 30.0, 40.0] {
            ring.push(angle);
        }
        // 4 % 4 would alias the current slot
        assert_eq!(ring.delta(4), None);
        assert_eq!(ring.delta(25), None);
        assert_eq!(ring.sample(4), None);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut ring = AngleRingBuffer::new(5);
        ring.push(10.0);
        ring.push(20.0);
        ring.reset();
        ring.push(30.0);
        assert_eq!(ring.delta(1), None);
        assert_eq!(ring.delta(0), Some(0.0));
    }
}
