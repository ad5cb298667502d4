//! Inter-task communication channels
//!
//! The control task is the only consumer of samples and frames and the
//! only producer of outgoing messages.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use portable_atomic::{AtomicU32, Ordering};

use ayab_core::encoders::EncoderSample;
use ayab_protocol::{DeviceMessage, RawFrame};

/// Channel capacity for encoder samples
///
/// Holds a full control period of edges at top carriage speed.
const SAMPLE_CHANNEL_SIZE: usize = 32;

/// Channel capacity for received frames
const FRAME_CHANNEL_SIZE: usize = 4;

/// Channel capacity for outgoing messages
const OUTGOING_CHANNEL_SIZE: usize = 16;

/// Encoder samples from the encoder task
pub static SAMPLE_CHANNEL: Channel<CriticalSectionRawMutex, EncoderSample, SAMPLE_CHANNEL_SIZE> =
    Channel::new();

/// Unframed host packets from the RX task
pub static FRAME_CHANNEL: Channel<CriticalSectionRawMutex, RawFrame, FRAME_CHANNEL_SIZE> =
    Channel::new();

/// Messages for the TX task
pub static OUTGOING: Channel<CriticalSectionRawMutex, DeviceMessage, OUTGOING_CHANNEL_SIZE> =
    Channel::new();

/// Samples lost to a full sample channel
pub static SAMPLES_DROPPED: AtomicU32 = AtomicU32::new(0);

/// Frames lost to SLIP errors or a full frame channel
pub static FRAMES_DROPPED: AtomicU32 = AtomicU32::new(0);

/// Count one lost item
pub fn count(counter: &AtomicU32) -> u32 {
    counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}
