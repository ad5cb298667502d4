//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in ayab-core:
//!
//! - Solenoid bank on two MCP23008 I/O expanders
//! - Piezo beeper on a GPIO pin

#![no_std]
#![deny(unsafe_code)]

pub mod beeper;
pub mod solenoid;

pub use beeper::GpioBeeper;
pub use solenoid::{Error, Mcp23008Solenoids};
