//! Result codes carried in acknowledgement and status messages
//!
//! The numeric values form a versioned table tied to
//! [`API_VERSION`](crate::messages::API_VERSION). Earlier protocol revisions
//! numbered these differently, so values are matched explicitly and never
//! derived from declaration order.

use crate::frame::FrameError;

/// How an error affects the operating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    /// Reported, no state change
    Warning,
    /// Reported, state falls back to a safe state
    Recoverable,
    /// Forces the error state
    Critical,
    /// Forces the error state
    Fatal,
}

/// Operation result code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    Success = 0x00,

    // Message errors
    ExpectedLongerMessage = 0x01,
    UnrecognizedMsgId = 0x02,
    UnexpectedMsgId = 0x03,
    ChecksumError = 0x04,

    // Domain validation (0x12 is reserved)
    MachineTypeInvalid = 0x10,
    NeedleValueInvalid = 0x11,
    ArgumentInvalid = 0x13,
    ArgumentsIncompatible = 0x14,

    // Missing facts
    NoMachineType = 0x20,
    NoCarriage = 0x21,
    NoDirection = 0x22,
    NoBeltShift = 0x23,

    // Machine state
    MachineStateInit = 0xE0,
    MachineStateReady = 0xE1,
    MachineStateKnit = 0xE2,
    MachineStateTest = 0xE3,
    WrongMachineState = 0xEF,

    // Generic
    Warning = 0xF0,
    RecoverableError = 0xF1,
    CriticalError = 0xF2,
    FatalError = 0xF3,
    UnspecifiedFailure = 0xFF,
}

impl ErrorCode {
    /// Wire value
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Look up a wire value in the current table
    pub const fn from_byte(byte: u8) -> Option<Self> {
        use ErrorCode::*;

        Some(match byte {
            0x00 => Success,
            0x01 => ExpectedLongerMessage,
            0x02 => UnrecognizedMsgId,
            0x03 => UnexpectedMsgId,
            0x04 => ChecksumError,
            0x10 => MachineTypeInvalid,
            0x11 => NeedleValueInvalid,
            0x13 => ArgumentInvalid,
            0x14 => ArgumentsIncompatible,
            0x20 => NoMachineType,
            0x21 => NoCarriage,
            0x22 => NoDirection,
            0x23 => NoBeltShift,
            0xE0 => MachineStateInit,
            0xE1 => MachineStateReady,
            0xE2 => MachineStateKnit,
            0xE3 => MachineStateTest,
            0xEF => WrongMachineState,
            0xF0 => Warning,
            0xF1 => RecoverableError,
            0xF2 => CriticalError,
            0xF3 => FatalError,
            0xFF => UnspecifiedFailure,
            _ => return None,
        })
    }

    pub const fn is_success(self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Severity band, `None` for `Success`
    pub const fn severity(self) -> Option<Severity> {
        use ErrorCode::*;

        match self {
            Success => None,
            ExpectedLongerMessage
            | UnrecognizedMsgId
            | UnexpectedMsgId
            | ChecksumError
            | MachineStateInit
            | MachineStateReady
            | MachineStateKnit
            | MachineStateTest
            | WrongMachineState
            | Warning
            | UnspecifiedFailure => Some(Severity::Warning),
            MachineTypeInvalid
            | NeedleValueInvalid
            | ArgumentInvalid
            | ArgumentsIncompatible
            | NoMachineType
            | NoCarriage
            | NoDirection
            | NoBeltShift
            | RecoverableError => Some(Severity::Recoverable),
            CriticalError => Some(Severity::Critical),
            FatalError => Some(Severity::Fatal),
        }
    }

    /// Whether this code forces the error state
    pub const fn is_fatal(self) -> bool {
        matches!(
            self.severity(),
            Some(Severity::Critical) | Some(Severity::Fatal)
        )
    }
}

impl From<FrameError> for ErrorCode {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::TooShort => ErrorCode::ExpectedLongerMessage,
            FrameError::InvalidChecksum => ErrorCode::ChecksumError,
            _ => ErrorCode::UnspecifiedFailure,
        }
    }
}
