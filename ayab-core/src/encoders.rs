//! Carriage tracking from the quadrature encoder and hall sensors
//!
//! ENC_A and ENC_B form a quadrature pair driven by the carriage belt.
//! A rising ENC_A edge with ENC_B high is one step to the right; a falling
//! ENC_A edge with ENC_B high is one step to the left. The end-of-line hall
//! sensors are only consulted on those edges, so a reading between edges
//! never moves the carriage.
//!
//! The hall filter band is the sensor's idle range. A reading outside it is
//! a carriage magnet passing the sensor, which re-anchors the absolute
//! position and identifies the carriage.

use ayab_protocol::{ErrorCode, StateReport};

use crate::machine::{BeltShift, Carriage, Direction, Geometry, MachineType};
use crate::needle::{self, NeedleSelection};

/// One sample of the encoder inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderSample {
    pub enc_a: bool,
    pub enc_b: bool,
    /// Belt phase input
    pub enc_c: bool,
    pub hall_left: u16,
    pub hall_right: u16,
    pub timestamp_ms: u32,
}

/// Copy of the tracked facts taken once per control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderSnapshot {
    pub machine: Option<MachineType>,
    pub position: u8,
    pub direction: Option<Direction>,
    /// Hall sensor that saw the carriage last
    pub hall_active: Option<Direction>,
    pub carriage: Option<Carriage>,
    /// `Unknown` when never sampled or stale
    pub belt_shift: BeltShift,
    pub hall_left: u16,
    pub hall_right: u16,
    pub timestamp_ms: u32,
    /// Fault latched since the previous snapshot
    pub fault: Option<ErrorCode>,
}

impl EncoderSnapshot {
    pub fn machine_type(&self) -> Result<MachineType, ErrorCode> {
        self.machine.ok_or(ErrorCode::NoMachineType)
    }

    pub fn direction(&self) -> Result<Direction, ErrorCode> {
        self.machine_type()?;
        self.direction.ok_or(ErrorCode::NoDirection)
    }

    pub fn carriage(&self) -> Result<Carriage, ErrorCode> {
        self.machine_type()?;
        self.carriage.ok_or(ErrorCode::NoCarriage)
    }

    pub fn belt_shift(&self) -> Result<BeltShift, ErrorCode> {
        self.machine_type()?;
        match self.belt_shift {
            BeltShift::Unknown => Err(ErrorCode::NoBeltShift),
            shift => Ok(shift),
        }
    }

    /// Solenoid addressed at `position` for the current pass
    pub fn needle_for_position(&self, position: u8, belt_shift: BeltShift) -> Result<u8, ErrorCode> {
        let machine = self.machine_type()?;
        let direction = self.direction()?;
        let carriage = self.carriage()?;
        needle::select(machine, position, direction, carriage, belt_shift).map(|s| s.solenoid)
    }

    /// Pixel and solenoid at the current position
    pub fn selection(&self) -> Result<NeedleSelection, ErrorCode> {
        needle::select(
            self.machine_type()?,
            self.position,
            self.direction()?,
            self.carriage()?,
            self.belt_shift,
        )
    }

    /// Status report for the host
    pub fn report(&self, error: ErrorCode, state: u8) -> StateReport {
        StateReport {
            error,
            state,
            hall_left: self.hall_left,
            hall_right: self.hall_right,
            carriage: Carriage::wire(self.carriage),
            position: self.position,
            direction: Direction::wire(self.direction),
        }
    }
}

/// Encoder tracker
#[derive(Debug, Clone, Default)]
pub struct Encoders {
    machine: Option<MachineType>,
    /// Last ENC_A level, `None` before the first sample
    enc_a: Option<bool>,
    position: u8,
    direction: Option<Direction>,
    hall_active: Option<Direction>,
    carriage: Option<Carriage>,
    belt_shift: BeltShift,
    /// Position changes since the belt shift was last sampled
    belt_age: u16,
    /// Hall side whose landmark will re-confirm the belt shift
    landmark: Option<Direction>,
    /// Consecutive edges pushing against a clamp
    overrun: u8,
    hall_left: u16,
    hall_right: u16,
    timestamp_ms: u32,
    fault: Option<ErrorCode>,
}

impl Encoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the machine type and forget everything about the current pass
    pub fn init(&mut self, machine: MachineType) {
        *self = Self {
            machine: Some(machine),
            enc_a: self.enc_a,
            position: machine.geometry().end_left,
            ..Self::default()
        };
    }

    /// Forget the machine type and all carriage facts
    pub fn reset(&mut self) {
        *self = Self {
            enc_a: self.enc_a,
            ..Self::default()
        };
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn machine_type(&self) -> Result<MachineType, ErrorCode> {
        self.peek().machine_type()
    }

    pub fn direction(&self) -> Result<Direction, ErrorCode> {
        self.peek().direction()
    }

    pub fn carriage(&self) -> Result<Carriage, ErrorCode> {
        self.peek().carriage()
    }

    pub fn belt_shift(&self) -> Result<BeltShift, ErrorCode> {
        self.peek().belt_shift()
    }

    pub fn needle_for_position(&self, position: u8, belt_shift: BeltShift) -> Result<u8, ErrorCode> {
        self.peek().needle_for_position(position, belt_shift)
    }

    /// Facts without clearing the latched fault
    pub fn peek(&self) -> EncoderSnapshot {
        let belt_shift = match self.machine {
            Some(machine) if self.belt_age <= machine.geometry().pass_length() => self.belt_shift,
            _ => BeltShift::Unknown,
        };

        EncoderSnapshot {
            machine: self.machine,
            position: self.position,
            direction: self.direction,
            hall_active: self.hall_active,
            carriage: self.carriage,
            belt_shift,
            hall_left: self.hall_left,
            hall_right: self.hall_right,
            timestamp_ms: self.timestamp_ms,
            fault: self.fault,
        }
    }

    /// Facts for this control cycle; reads and clears the latched fault
    pub fn snapshot(&mut self) -> EncoderSnapshot {
        let snapshot = self.peek();
        self.fault = None;
        snapshot
    }

    /// Process one sample of the encoder inputs
    ///
    /// Returns `NeedleValueInvalid` when the edge would move the carriage
    /// past a track end (the position stays clamped) and `NoMachineType`
    /// for edges seen before a machine is set.
    pub fn on_sample(&mut self, sample: &EncoderSample) -> Result<(), ErrorCode> {
        self.hall_left = sample.hall_left;
        self.hall_right = sample.hall_right;
        self.timestamp_ms = sample.timestamp_ms;

        let previous = self.enc_a.replace(sample.enc_a);
        if previous.map_or(true, |level| level == sample.enc_a) {
            return Ok(());
        }

        let machine = self.machine.ok_or(ErrorCode::NoMachineType)?;
        let geometry = machine.geometry();

        let result = if sample.enc_a {
            self.on_rising(sample, machine, geometry)
        } else {
            self.on_falling(sample, geometry)
        };

        if let Err(e) = result {
            self.fault = Some(e);
        }
        result
    }

    fn on_rising(
        &mut self,
        sample: &EncoderSample,
        machine: MachineType,
        geometry: &Geometry,
    ) -> Result<(), ErrorCode> {
        let direction = if sample.enc_b {
            Direction::Right
        } else {
            Direction::Left
        };
        self.direction = Some(direction);

        let moved = match direction {
            Direction::Right => self.step(direction, sample.enc_c, geometry),
            Direction::Left => Ok(()),
        };

        self.detect_left(sample, machine, geometry);
        moved
    }

    fn on_falling(&mut self, sample: &EncoderSample, geometry: &Geometry) -> Result<(), ErrorCode> {
        let direction = if sample.enc_b {
            Direction::Left
        } else {
            Direction::Right
        };
        self.direction = Some(direction);

        let moved = match direction {
            Direction::Left => self.step(direction, sample.enc_c, geometry),
            Direction::Right => Ok(()),
        };

        self.detect_right(sample, geometry);
        moved
    }

    fn step(&mut self, direction: Direction, enc_c: bool, geometry: &Geometry) -> Result<(), ErrorCode> {
        let next = match direction {
            Direction::Right if self.position < geometry.end_right => Some(self.position + 1),
            Direction::Left if self.position > geometry.end_left => Some(self.position - 1),
            _ => None,
        };

        let Some(position) = next else {
            self.overrun = self.overrun.saturating_add(1);
            if self.overrun > geometry.end_offset {
                // Off the bed: nothing about this pass is trustworthy
                self.carriage = None;
                self.belt_shift = BeltShift::Unknown;
                self.landmark = None;
            }
            return Err(ErrorCode::NeedleValueInvalid);
        };

        self.position = position;
        self.overrun = 0;
        self.belt_age = self.belt_age.saturating_add(1);

        match (self.landmark, direction) {
            (Some(Direction::Left), Direction::Right)
                if position == geometry.all_magnets_cleared_left =>
            {
                self.sample_belt(Direction::Left, enc_c);
            }
            (Some(Direction::Right), Direction::Left)
                if position == geometry.all_magnets_cleared_right =>
            {
                self.sample_belt(Direction::Right, enc_c);
            }
            _ => {}
        }
        Ok(())
    }

    fn detect_left(&mut self, sample: &EncoderSample, machine: MachineType, geometry: &Geometry) {
        // A Garter carriage, or the KH270's second magnet, must not re-anchor
        if self.carriage == Some(Carriage::Garter)
            || (machine == MachineType::Kh270 && self.carriage == Some(Carriage::Knit))
        {
            return;
        }

        let filter = geometry.filter_left;
        if filter.in_band(sample.hall_left) {
            return;
        }
        self.hall_active = Some(Direction::Left);

        let detected = if sample.hall_left > filter.max {
            Carriage::Knit
        } else {
            Carriage::Lace
        };
        let mut start = geometry.end_left_plus_offset();

        if machine == MachineType::Kh270 {
            // Only a knit carriage exists; its leading magnet reads like lace
            self.carriage = Some(Carriage::Knit);
            if detected == Carriage::Knit {
                start += geometry.magnet_distance;
            }
        } else if matches!(self.carriage, Some(c) if c != detected) && self.position > start {
            // Second magnet set of a garter carriage moving right
            self.carriage = Some(Carriage::Garter);
            return;
        } else {
            self.carriage = Some(detected);
        }

        self.sample_belt(Direction::Left, sample.enc_c);
        self.landmark = Some(Direction::Left);
        self.position = start;
    }

    fn detect_right(&mut self, sample: &EncoderSample, geometry: &Geometry) {
        let filter = geometry.filter_right;
        if filter.in_band(sample.hall_right) {
            return;
        }
        self.hall_active = Some(Direction::Right);

        if self.carriage == Some(Carriage::Garter) {
            return;
        }
        if sample.hall_right < filter.min {
            self.carriage = Some(Carriage::Knit);
        }

        self.sample_belt(Direction::Right, sample.enc_c);
        self.landmark = Some(Direction::Right);
        self.position = geometry.end_right_minus_offset();
    }

    /// ENC_C polarity is mirrored between the two sensors
    fn sample_belt(&mut self, side: Direction, enc_c: bool) {
        let regular = match side {
            Direction::Left => enc_c,
            Direction::Right => !enc_c,
        };
        let lace = self.carriage == Some(Carriage::Lace);

        self.belt_shift = match (regular, lace) {
            (true, false) => BeltShift::Regular,
            (false, false) => BeltShift::Shifted,
            (true, true) => BeltShift::LaceRegular,
            (false, true) => BeltShift::LaceShifted,
        };
        self.belt_age = 0;
        if self.landmark == Some(side) {
            self.landmark = None;
        }
    }
}
