//! Carriage and line watchdog

use ayab_protocol::ErrorCode;

use crate::config::FirmwareConfig;

/// Safety condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafetyStatus {
    /// All conditions normal
    Ok,
    /// Safety condition violated
    Fault(ErrorCode),
}

/// Knitting watchdog
///
/// Armed for the duration of a knit job. A timeout of zero disables the
/// corresponding check.
#[derive(Debug, Clone, Default)]
pub struct CarriageWatchdog {
    stall_timeout_ms: u32,
    line_timeout_ms: u32,
    armed: bool,
    /// Carriage is between the first and last needle of a line
    row_in_progress: bool,
    last_position: Option<u8>,
    last_move_ms: u32,
    /// When the outstanding line was requested
    line_requested_ms: Option<u32>,
    /// Carriage hit a track end mid-row
    left_bed: bool,
}

impl CarriageWatchdog {
    pub fn new(stall_timeout_ms: u32, line_timeout_ms: u32) -> Self {
        Self {
            stall_timeout_ms,
            line_timeout_ms,
            ..Self::default()
        }
    }

    pub fn from_config(config: &FirmwareConfig) -> Self {
        Self::new(config.stall_timeout_ms, config.line_timeout_ms)
    }

    /// Start watching a knit job
    pub fn arm(&mut self, now_ms: u32) {
        *self = Self {
            armed: true,
            last_move_ms: now_ms,
            ..Self::new(self.stall_timeout_ms, self.line_timeout_ms)
        };
    }

    pub fn disarm(&mut self) {
        *self = Self::new(self.stall_timeout_ms, self.line_timeout_ms);
    }

    /// Record the carriage position of this control cycle
    pub fn observe(&mut self, now_ms: u32, position: u8, row_in_progress: bool) {
        if self.last_position != Some(position) || !row_in_progress {
            self.last_move_ms = now_ms;
        }
        self.last_position = Some(position);
        self.row_in_progress = row_in_progress;
    }

    pub fn line_requested(&mut self, now_ms: u32) {
        self.line_requested_ms = Some(now_ms);
    }

    pub fn line_received(&mut self) {
        self.line_requested_ms = None;
    }

    /// Report a clamp at a track end
    pub fn clamped(&mut self, row_in_progress: bool) {
        if self.armed && row_in_progress {
            self.left_bed = true;
        }
    }

    /// Check all conditions
    ///
    /// Returns the first fault detected, or Ok if all conditions are normal.
    pub fn check(&self, now_ms: u32) -> SafetyStatus {
        if !self.armed {
            return SafetyStatus::Ok;
        }

        if self.left_bed {
            return SafetyStatus::Fault(ErrorCode::CriticalError);
        }

        if self.stall_timeout_ms > 0
            && self.row_in_progress
            && now_ms.wrapping_sub(self.last_move_ms) >= self.stall_timeout_ms
        {
            return SafetyStatus::Fault(ErrorCode::CriticalError);
        }

        if let Some(requested) = self.line_requested_ms {
            if self.line_timeout_ms > 0 && now_ms.wrapping_sub(requested) >= self.line_timeout_ms {
                return SafetyStatus::Fault(ErrorCode::CriticalError);
            }
        }

        SafetyStatus::Ok
    }
}
