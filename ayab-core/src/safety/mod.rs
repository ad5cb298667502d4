//! Safety monitoring
//!
//! Detects a carriage that stopped or left the bed mid-row, and a host
//! that stopped sending lines, and turns them into critical faults.

pub mod watchdog;

pub use watchdog::{CarriageWatchdog, SafetyStatus};
