//! Solenoid bank trait

use core::convert::Infallible;

/// Bank of up to 16 needle-selection solenoids
///
/// Bit `n` of the mask drives solenoid `n`; a set bit energises it.
pub trait SolenoidBank {
    /// Bus or pin error of the implementation
    type Error;

    /// Drive every solenoid from `mask`
    fn write(&mut self, mask: u16) -> Result<(), Self::Error>;
}

/// Return `mask` with solenoid `index` set to `on`
pub const fn with_solenoid(mask: u16, index: u8, on: bool) -> u16 {
    let bit = 1u16 << (index & 0x0F);
    if on {
        mask | bit
    } else {
        mask & !bit
    }
}

/// In-memory solenoid bank
///
/// Keeps the last written mask and counts writes.
#[derive(Debug, Clone, Default)]
pub struct MemorySolenoids {
    mask: u16,
    writes: u32,
}

impl MemorySolenoids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    /// Number of writes since creation
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn is_on(&self, index: u8) -> bool {
        index < 16 && self.mask & (1 << index) != 0
    }
}

impl SolenoidBank for MemorySolenoids {
    type Error = Infallible;

    fn write(&mut self, mask: u16) -> Result<(), Self::Error> {
        self.mask = mask;
        self.writes = self.writes.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_solenoid() {
        assert_eq!(with_solenoid(0, 3, true), 0b1000);
        assert_eq!(with_solenoid(0xFFFF, 15, false), 0x7FFF);
        assert_eq!(with_solenoid(0b1000, 3, true), 0b1000);
    }

    #[test]
    fn test_memory_bank() {
        let mut bank = MemorySolenoids::new();
        bank.write(0x8001).unwrap();

        assert_eq!(bank.mask(), 0x8001);
        assert!(bank.is_on(0));
        assert!(bank.is_on(15));
        assert!(!bank.is_on(1));
        assert!(!bank.is_on(16));
        assert_eq!(bank.writes(), 1);
    }
}
