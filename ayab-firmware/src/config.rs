//! Build-time configuration
//!
//! `build.rs` validates `machine.toml` and generates `FIRMWARE_CONFIG`.

use ayab_core::config::FirmwareConfig;

include!(concat!(env!("OUT_DIR"), "/config.rs"));
