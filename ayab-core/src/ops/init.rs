//! Carriage detection while waiting for the first pass
//!
//! The carriage must travel clear of a hall sensor before the position is
//! trusted. A garter carriage carries a second magnet set, so the decision
//! waits `GARTER_SLOP` needles past the anchor.

use crate::encoders::EncoderSnapshot;
use crate::machine::{Direction, GARTER_SLOP};

/// Decides when the Init state is complete
#[derive(Debug, Clone, Default)]
pub struct InitDetector {
    /// Last hall sensor that saw the carriage
    last_hall: Option<Direction>,
}

impl InitDetector {
    pub const fn new() -> Self {
        Self { last_hall: None }
    }

    pub fn reset(&mut self) {
        self.last_hall = None;
    }

    /// Check if the carriage has passed a sensor and moved clear of it
    pub fn is_ready(&mut self, facts: &EncoderSnapshot) -> bool {
        if facts.hall_active.is_some() {
            self.last_hall = facts.hall_active;
        }

        let Some(machine) = facts.machine else {
            return false;
        };
        let geometry = machine.geometry();
        let position = u16::from(facts.position);

        let passed_left = facts.direction == Some(Direction::Right)
            && self.last_hall == Some(Direction::Left)
            && position > u16::from(geometry.end_left_plus_offset()) + u16::from(GARTER_SLOP);

        let passed_right = facts.direction == Some(Direction::Left)
            && self.last_hall == Some(Direction::Right)
            && position + u16::from(GARTER_SLOP) < u16::from(geometry.end_right_minus_offset());

        passed_left || passed_right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::tests::Driver;
    use crate::machine::MachineType;

    #[test]
    fn test_not_ready_before_sensor() {
        let mut d = Driver::new(MachineType::Kh910);
        let mut init = InitDetector::new();
        d.right(100).unwrap();
        assert!(!init.is_ready(&d.enc.peek()));
    }

    #[test]
    fn test_ready_after_passing_left_sensor() {
        let mut d = Driver::new(MachineType::Kh910);
        let mut init = InitDetector::new();
        d.pass_left_sensor();

        // Anchored at 28; still inside the garter slop
        d.right(2).unwrap();
        assert!(!init.is_ready(&d.enc.peek()));

        d.right(1).unwrap();
        assert!(init.is_ready(&d.enc.peek()));
    }

    #[test]
    fn test_ready_after_passing_right_sensor() {
        let mut d = Driver::new(MachineType::Kh930);
        let mut init = InitDetector::new();
        d.right(240).unwrap();
        d.left_with(900).unwrap();
        assert_eq!(d.enc.position(), 227);
        assert!(!init.is_ready(&d.enc.peek()));

        d.left(3).unwrap();
        assert!(init.is_ready(&d.enc.peek()));
    }

    #[test]
    fn test_wrong_direction_is_not_ready() {
        let mut d = Driver::new(MachineType::Kh910);
        let mut init = InitDetector::new();
        d.pass_left_sensor();
        d.right(20).unwrap();
        d.left(1).unwrap();
        assert!(!init.is_ready(&d.enc.peek()));
    }
}
