//! AYAB host communication protocol
//!
//! This crate defines the serial protocol between the knitting machine
//! controller and the host computer that supplies the pattern.
//!
//! # Protocol Overview
//!
//! Every message is a SLIP-framed, checksummed packet:
//! ```text
//! ┌─────┬───────┬─────────────┬──────────┬─────┐
//! │ END │ MSGID │ PAYLOAD     │ CHECKSUM │ END │
//! │ C0  │ 1B    │ 0–62B       │ 1B (XOR) │ C0  │
//! └─────┴───────┴─────────────┴──────────┴─────┘
//! ```
//!
//! `END` / `ESC` bytes inside the frame are byte-stuffed. Message ids and
//! error codes form versioned tables (see [`API_VERSION`]).

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod error;
pub mod frame;
pub mod messages;
pub mod packet;

pub use error::{ErrorCode, Severity};
pub use frame::{checksum, FrameDecoder, FrameError, RawFrame, MAX_FRAME_SIZE};
pub use messages::{DeviceMessage, MessageId, StateReport, API_VERSION, MAX_TEST_TEXT};
pub use packet::{Packet, MAX_PAYLOAD_SIZE};
