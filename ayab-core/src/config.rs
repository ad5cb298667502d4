//! Firmware configuration
//!
//! Timing, beeper and bus settings. The firmware bakes one instance in at
//! build time from `machine.toml`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Valid 7-bit I2C range for the MCP23008 expanders
const MCP23008_ADDRESSES: core::ops::RangeInclusive<u8> = 0x20..=0x27;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Control period must be at least one millisecond
    ZeroControlPeriod,
    /// A periodic interval is shorter than the control period
    IntervalTooShort,
    /// A non-zero timeout is shorter than the status interval
    TimeoutTooShort,
    /// Baud rate is zero
    InvalidBaudRate,
    /// Expander address outside 0x20..=0x27
    InvalidI2cAddress(u8),
    /// Both expanders share an address
    DuplicateI2cAddress,
}

/// Runtime settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareConfig {
    /// Control loop period
    pub control_period_ms: u32,
    /// Status report period in the error state
    pub status_interval_ms: u32,
    /// Tick of the test auto modes
    pub test_interval_ms: u32,
    /// Carriage standstill tolerated mid-row, 0 disables
    pub stall_timeout_ms: u32,
    /// Time the host has to answer a line request, 0 disables
    pub line_timeout_ms: u32,
    pub beeper_enabled: bool,
    pub baud_rate: u32,
    /// I2C addresses of the low-byte and high-byte expanders
    pub solenoid_addresses: [u8; 2],
}

impl FirmwareConfig {
    pub const DEFAULT: Self = Self {
        control_period_ms: 2,
        status_interval_ms: 500,
        test_interval_ms: 500,
        stall_timeout_ms: 120_000,
        line_timeout_ms: 10_000,
        beeper_enabled: true,
        baud_rate: 115_200,
        solenoid_addresses: [0x20, 0x21],
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_period_ms == 0 {
            return Err(ConfigError::ZeroControlPeriod);
        }
        if self.status_interval_ms < self.control_period_ms
            || self.test_interval_ms < self.control_period_ms
        {
            return Err(ConfigError::IntervalTooShort);
        }
        for timeout in [self.stall_timeout_ms, self.line_timeout_ms] {
            if timeout != 0 && timeout < self.status_interval_ms {
                return Err(ConfigError::TimeoutTooShort);
            }
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate);
        }
        for address in self.solenoid_addresses {
            if !MCP23008_ADDRESSES.contains(&address) {
                return Err(ConfigError::InvalidI2cAddress(address));
            }
        }
        if self.solenoid_addresses[0] == self.solenoid_addresses[1] {
            return Err(ConfigError::DuplicateI2cAddress);
        }
        Ok(())
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
