//! Machine types, carriage facts and per-machine geometry

use ayab_protocol::ErrorCode;

/// Tolerance around the hall sensors when deciding the carriage passed them
pub const GARTER_SLOP: u8 = 2;

/// Mask with every solenoid energised
pub const SOLENOIDS_BITMASK: u16 = 0xFFFF;

/// Largest line buffer of any supported machine
pub const MAX_LINE_BUFFER_LEN: usize = 25;

/// Supported knitting machines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MachineType {
    Kh910,
    Kh930,
    Kh270,
}

impl MachineType {
    /// Decode the host's machine type byte
    pub const fn from_wire(byte: u8) -> Result<Self, ErrorCode> {
        match byte {
            0 => Ok(MachineType::Kh910),
            1 => Ok(MachineType::Kh930),
            2 => Ok(MachineType::Kh270),
            _ => Err(ErrorCode::MachineTypeInvalid),
        }
    }

    pub const fn to_wire(self) -> u8 {
        match self {
            MachineType::Kh910 => 0,
            MachineType::Kh930 => 1,
            MachineType::Kh270 => 2,
        }
    }

    /// Static geometry for this machine
    pub const fn geometry(self) -> &'static Geometry {
        match self {
            MachineType::Kh910 => &KH910,
            MachineType::Kh930 => &KH930,
            MachineType::Kh270 => &KH270,
        }
    }
}

/// Carriage travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    const fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }

    /// Wire value, 0xFF when unknown
    pub const fn wire(direction: Option<Direction>) -> u8 {
        match direction {
            Some(Direction::Left) => 0,
            Some(Direction::Right) => 1,
            None => 0xFF,
        }
    }
}

/// Carriage fitted to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Carriage {
    Knit,
    Lace,
    Garter,
}

impl Carriage {
    const fn index(self) -> usize {
        match self {
            Carriage::Knit => 0,
            Carriage::Lace => 1,
            Carriage::Garter => 2,
        }
    }

    /// Wire value, 0xFF when unknown
    pub const fn wire(carriage: Option<Carriage>) -> u8 {
        match carriage {
            Some(Carriage::Knit) => 0,
            Some(Carriage::Lace) => 1,
            Some(Carriage::Garter) => 2,
            None => 0xFF,
        }
    }
}

/// Belt phase relative to the solenoids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeltShift {
    #[default]
    Unknown,
    Regular,
    Shifted,
    LaceRegular,
    LaceShifted,
}

impl BeltShift {
    /// Collapse the lace variants onto their plain counterparts
    pub const fn is_shifted(self) -> Option<bool> {
        match self {
            BeltShift::Regular | BeltShift::LaceRegular => Some(false),
            BeltShift::Shifted | BeltShift::LaceShifted => Some(true),
            BeltShift::Unknown => None,
        }
    }
}

/// Hall sensor idle band; readings outside it indicate a magnet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HallFilter {
    pub min: u16,
    pub max: u16,
}

impl HallFilter {
    pub const fn in_band(&self, value: u16) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-machine constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    pub num_needles: u8,
    pub line_buffer_len: u8,
    pub end_left: u8,
    pub end_right: u8,
    pub end_offset: u8,
    pub all_magnets_cleared_left: u8,
    pub all_magnets_cleared_right: u8,
    pub end_of_line_offset_left: u8,
    pub end_of_line_offset_right: u8,
    pub solenoids: u8,
    /// Added to every computed solenoid index
    pub solenoid_shift: u8,
    /// Distance between the two carriage magnets, 0 when not applicable
    pub magnet_distance: u8,
    pub filter_left: HallFilter,
    pub filter_right: HallFilter,
    /// `[direction][carriage]`
    pub start_offset: [[u8; 3]; 2],
}

impl Geometry {
    /// Position the left hall sensor re-anchors to
    pub const fn end_left_plus_offset(&self) -> u8 {
        self.end_left + self.end_offset
    }

    /// Position the right hall sensor re-anchors to
    pub const fn end_right_minus_offset(&self) -> u8 {
        self.end_right - self.end_offset
    }

    pub const fn half_solenoids(&self) -> u8 {
        self.solenoids / 2
    }

    /// Encoder edges in one full pass of the track
    pub const fn pass_length(&self) -> u16 {
        (self.end_right - self.end_left) as u16
    }

    pub const fn start_offset(&self, direction: Direction, carriage: Carriage) -> u8 {
        self.start_offset[direction.index()][carriage.index()]
    }
}

const KH910: Geometry = Geometry {
    num_needles: 200,
    line_buffer_len: 25,
    end_left: 0,
    end_right: 255,
    end_offset: 28,
    all_magnets_cleared_left: 56,
    all_magnets_cleared_right: 199,
    end_of_line_offset_left: 12,
    end_of_line_offset_right: 12,
    solenoids: 16,
    solenoid_shift: 0,
    magnet_distance: 0,
    filter_left: HallFilter { min: 200, max: 600 },
    filter_right: HallFilter { min: 200, max: 1023 },
    start_offset: [[40, 40, 8], [16, 16, 32]],
};

const KH930: Geometry = Geometry {
    filter_right: HallFilter { min: 0, max: 600 },
    ..KH910
};

const KH270: Geometry = Geometry {
    num_needles: 114,
    line_buffer_len: 15,
    end_left: 0,
    end_right: 141,
    end_offset: 14,
    all_magnets_cleared_left: 28,
    all_magnets_cleared_right: 113,
    end_of_line_offset_left: 6,
    end_of_line_offset_right: 6,
    solenoids: 12,
    solenoid_shift: 3,
    magnet_distance: 12,
    filter_left: HallFilter { min: 200, max: 600 },
    filter_right: HallFilter { min: 0, max: 600 },
    start_offset: [[14, 14, 2], [2, 2, 14]],
};
