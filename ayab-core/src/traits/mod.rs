//! Hardware abstraction traits
//!
//! The controller drives the solenoids and the beeper only through these
//! traits, so the core logic runs unchanged on the board and in tests.

pub mod beeper;
pub mod solenoids;

pub use beeper::{BeepEvent, Beeper, BEEP_DELAY_MS};
pub use solenoids::{with_solenoid, MemorySolenoids, SolenoidBank};
