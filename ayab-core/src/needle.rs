//! Carriage position to pattern pixel and solenoid mapping

use ayab_protocol::ErrorCode;

use crate::machine::{BeltShift, Carriage, Direction, MachineType};

/// Pattern pixel and solenoid for one carriage position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NeedleSelection {
    /// Needle index into the line buffer
    pub pixel: u8,
    /// Solenoid bit to drive
    pub solenoid: u8,
}

/// Pattern pixel under the selecting cam, without range checks
///
/// The selecting cam sits `start_offset` needles behind the carriage
/// reference in the direction of travel. The result may be negative or
/// past the last needle while the carriage is beyond the pattern.
pub fn raw_pixel(machine: MachineType, position: u8, direction: Direction, carriage: Carriage) -> i16 {
    let geometry = machine.geometry();
    let pos = i16::from(position);

    match direction {
        Direction::Right => {
            let pixel = pos - i16::from(geometry.start_offset(Direction::Left, carriage));
            if carriage == Carriage::Lace {
                pixel + i16::from(geometry.half_solenoids())
            } else {
                pixel
            }
        }
        Direction::Left => {
            let pixel = pos - i16::from(geometry.start_offset(Direction::Right, carriage));
            if carriage == Carriage::Lace {
                pixel - i16::from(geometry.solenoids)
            } else {
                pixel
            }
        }
    }
}

/// Map a carriage position to the needle it selects
///
/// The belt phase decides which half of the solenoid bank lines up with
/// the needle under the cam. The KH270 always uses the regular mapping and
/// accepts an unknown belt shift.
pub fn select(
    machine: MachineType,
    position: u8,
    direction: Direction,
    carriage: Carriage,
    belt_shift: BeltShift,
) -> Result<NeedleSelection, ErrorCode> {
    let geometry = machine.geometry();
    let shifted = match machine {
        MachineType::Kh270 => false,
        _ => belt_shift.is_shifted().ok_or(ErrorCode::NoBeltShift)?,
    };

    let solenoids = i16::from(geometry.solenoids);
    let half = i16::from(geometry.half_solenoids());
    let pos = i16::from(position);

    let solenoid = match direction {
        Direction::Right => {
            if pos < i16::from(geometry.start_offset(Direction::Left, carriage)) {
                return Err(ErrorCode::ArgumentInvalid);
            }
            if shifted {
                pos - half
            } else {
                pos
            }
        }
        Direction::Left => {
            let start = i16::from(geometry.start_offset(Direction::Right, carriage));
            if pos > i16::from(geometry.end_right) - start {
                return Err(ErrorCode::ArgumentInvalid);
            }
            if shifted {
                pos
            } else {
                pos + half
            }
        }
    };

    let pixel = raw_pixel(machine, position, direction, carriage);
    if pixel < 0 || pixel >= i16::from(geometry.num_needles) {
        return Err(ErrorCode::ArgumentInvalid);
    }

    let solenoid = solenoid.rem_euclid(solenoids) + i16::from(geometry.solenoid_shift);

    Ok(NeedleSelection {
        pixel: pixel as u8,
        solenoid: solenoid as u8,
    })
}
