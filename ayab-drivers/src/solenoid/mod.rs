//! Solenoid bank drivers

pub mod mcp23008;

pub use mcp23008::{Error, Mcp23008Solenoids};
