//! Beeper drivers

pub mod gpio;

pub use gpio::GpioBeeper;
