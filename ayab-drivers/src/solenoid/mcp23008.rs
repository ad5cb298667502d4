//! MCP23008 solenoid bank
//!
//! Sixteen solenoids spread over two 8-bit I2C I/O expanders. The first
//! expander carries solenoids 0-7, the second 8-15.
//!
//! # Register Access
//!
//! Every access is a two-byte write: register address, then value.
//! - IODIR (0x00): pin direction, 0 = output
//! - GPIO (0x09): pin levels

use ayab_core::traits::SolenoidBank;
use embedded_hal::i2c::I2c;

/// MCP23008 register addresses
pub mod reg {
    /// I/O direction
    pub const IODIR: u8 = 0x00;
    /// Port register
    pub const GPIO: u8 = 0x09;
}

/// Default addresses of the low-byte and high-byte expanders
pub const DEFAULT_ADDRESSES: [u8; 2] = [0x20, 0x21];

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Bus error from the expander at `address`
    I2c { address: u8, source: E },
}

/// Two MCP23008 expanders driving the solenoids
pub struct Mcp23008Solenoids<I2C> {
    i2c: I2C,
    addresses: [u8; 2],
}

impl<I2C: I2c> Mcp23008Solenoids<I2C> {
    pub fn new(i2c: I2C, addresses: [u8; 2]) -> Self {
        Self { i2c, addresses }
    }

    /// Configure every expander pin as an output
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        for address in self.addresses {
            self.write_register(address, reg::IODIR, 0x00)?;
        }
        Ok(())
    }

    /// Release the bus
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(address, &[register, value])
            .map_err(|source| Error::I2c { address, source })
    }
}

impl<I2C: I2c> SolenoidBank for Mcp23008Solenoids<I2C> {
    type Error = Error<I2C::Error>;

    fn write(&mut self, mask: u16) -> Result<(), Self::Error> {
        let [high, low] = mask.to_be_bytes();
        let [low_address, high_address] = self.addresses;
        self.write_register(low_address, reg::GPIO, low)?;
        self.write_register(high_address, reg::GPIO, high)
    }
}
