//! SLIP framing and checksum for the host serial link.
//!
//! Every message travels as a SLIP frame:
//! - END (0xC0) delimits frames
//! - ESC (0xDB) introduces an escaped byte
//! - ESC_END (0xDC) / ESC_ESC (0xDD) stand for a literal END / ESC
//!
//! The decoder is stateful across calls; a partial frame survives until the
//! next END arrives.

use heapless::Vec;

/// Frame delimiter
pub const END: u8 = 0xC0;

/// Escape introducer
pub const ESC: u8 = 0xDB;

/// Escaped END
pub const ESC_END: u8 = 0xDC;

/// Escaped ESC
pub const ESC_ESC: u8 = 0xDD;

/// Maximum decoded frame size in bytes (message id + payload + checksum)
pub const MAX_FRAME_SIZE: usize = 64;

/// Worst case encoded size: every byte escaped plus both delimiters
pub const MAX_ENCODED_SIZE: usize = 2 * MAX_FRAME_SIZE + 2;

/// A decoded, unstuffed frame
pub type RawFrame = Vec<u8, MAX_FRAME_SIZE>;

/// Errors that can occur during framing or packet parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Incoming frame exceeded `MAX_FRAME_SIZE`; discarded
    Overflow,
    /// ESC followed by something other than ESC_END / ESC_ESC; discarded
    InvalidEscape,
    /// Output buffer too small for encoding
    BufferTooSmall,
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Frame shorter than message id + checksum
    TooShort,
    /// Trailing checksum does not match
    InvalidChecksum,
}

/// XOR-fold checksum
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Encode `payload` as a SLIP frame into `out`
///
/// Returns the number of bytes written.
pub fn encode(payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    let mut len = 0;

    let mut put = |byte: u8| -> Result<(), FrameError> {
        let slot = out.get_mut(len).ok_or(FrameError::BufferTooSmall)?;
        *slot = byte;
        len += 1;
        Ok(())
    };

    // Leading END flushes any line noise on the receiver side
    put(END)?;
    for &byte in payload {
        match byte {
            END => {
                put(ESC)?;
                put(ESC_END)?;
            }
            ESC => {
                put(ESC)?;
                put(ESC_ESC)?;
            }
            b => put(b)?,
        }
    }
    put(END)?;

    Ok(len)
}

/// Encode `payload` into a heapless Vec
pub fn encode_to_vec(payload: &[u8]) -> Result<Vec<u8, MAX_ENCODED_SIZE>, FrameError> {
    let mut buffer = [0u8; MAX_ENCODED_SIZE];
    let len = encode(payload, &mut buffer)?;
    let mut vec = Vec::new();
    vec.extend_from_slice(&buffer[..len])
        .map_err(|_| FrameError::BufferTooSmall)?;
    Ok(vec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Collecting plain bytes
    Normal,
    /// Previous byte was ESC
    Escaped,
    /// Dropping bytes until the next END
    Discarding,
}

/// Incremental SLIP decoder
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    buffer: RawFrame,
    discarded: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder
    pub const fn new() -> Self {
        Self {
            state: DecodeState::Normal,
            buffer: Vec::new(),
            discarded: 0,
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = DecodeState::Normal;
        self.buffer.clear();
    }

    /// Number of frames discarded since creation
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(frame))` when END closes a non-empty frame,
    /// `Ok(None)` when more bytes are needed. An `Err` reports a discarded
    /// frame; the decoder recovers at the next END on its own.
    pub fn feed(&mut self, byte: u8) -> Result<Option<RawFrame>, FrameError> {
        match self.state {
            DecodeState::Discarding => {
                if byte == END {
                    self.reset();
                }
                Ok(None)
            }
            DecodeState::Escaped => {
                let unescaped = match byte {
                    ESC_END => END,
                    ESC_ESC => ESC,
                    END => {
                        // END still delimits, so we are already resynchronised
                        self.reset();
                        self.discarded = self.discarded.wrapping_add(1);
                        return Err(FrameError::InvalidEscape);
                    }
                    _ => return self.discard(FrameError::InvalidEscape),
                };
                self.state = DecodeState::Normal;
                self.push(unescaped)
            }
            DecodeState::Normal => match byte {
                END => {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let frame = core::mem::take(&mut self.buffer);
                    Ok(Some(frame))
                }
                ESC => {
                    self.state = DecodeState::Escaped;
                    Ok(None)
                }
                b => self.push(b),
            },
        }
    }

    /// Decode a chunk of bytes lazily
    ///
    /// The returned iterator yields each completed frame or discard event.
    /// Bytes after the last END stay buffered for the next call.
    pub fn decode<'a>(&'a mut self, bytes: &'a [u8]) -> Frames<'a> {
        Frames {
            decoder: self,
            bytes: bytes.iter(),
        }
    }

    fn push(&mut self, byte: u8) -> Result<Option<RawFrame>, FrameError> {
        if self.buffer.push(byte).is_err() {
            return self.discard(FrameError::Overflow);
        }
        Ok(None)
    }

    fn discard(&mut self, error: FrameError) -> Result<Option<RawFrame>, FrameError> {
        self.buffer.clear();
        self.state = DecodeState::Discarding;
        self.discarded = self.discarded.wrapping_add(1);
        Err(error)
    }
}

/// Iterator over frames decoded from a byte chunk
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
    bytes: core::slice::Iter<'a, u8>,
}

impl Iterator for Frames<'_> {
    type Item = Result<RawFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        for &byte in self.bytes.by_ref() {
            match self.decoder.feed(byte) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
