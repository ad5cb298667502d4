//! Board-agnostic core logic for the AYAB knitting machine controller
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Machine geometry and carriage tracking from the encoders
//! - Needle to solenoid mapping
//! - Protocol state machine and the knit, init and test operations
//! - Knitting watchdog
//! - Hardware abstraction traits (solenoids, beeper)
//! - Firmware configuration

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod controller;
pub mod encoders;
pub mod fsm;
pub mod machine;
pub mod needle;
pub mod ops;
pub mod safety;
pub mod state;
pub mod traits;

pub use controller::{Controller, FIRMWARE_VERSION};
