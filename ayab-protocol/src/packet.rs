//! Checksummed message packets
//!
//! Unframed layout: `[msgId][payload...][checksum]`, where the checksum is
//! the XOR of the message id and every payload byte.

use heapless::Vec;

use crate::frame::{self, checksum, FrameError, RawFrame, MAX_ENCODED_SIZE, MAX_FRAME_SIZE};

/// Maximum payload size in bytes (frame minus id and checksum)
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - 2;

/// A decoded or constructed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Message identifier
    pub msg_id: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    /// Checksum over id and payload
    pub checksum: u8,
}

impl Packet {
    /// Create a packet, computing its checksum
    pub fn new(msg_id: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload: Vec<u8, MAX_PAYLOAD_SIZE> =
            Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        let checksum = msg_id ^ checksum(&payload);

        Ok(Self {
            msg_id,
            payload,
            checksum,
        })
    }

    /// Create a packet with no payload
    pub fn empty(msg_id: u8) -> Self {
        Self {
            msg_id,
            payload: Vec::new(),
            checksum: msg_id,
        }
    }

    /// Parse and verify an unframed message
    pub fn from_frame(frame: &[u8]) -> Result<Self, FrameError> {
        let (&msg_id, rest) = frame.split_first().ok_or(FrameError::TooShort)?;
        let (&received, payload) = rest.split_last().ok_or(FrameError::TooShort)?;

        let packet = Self::new(msg_id, payload)?;
        if packet.checksum != received {
            return Err(FrameError::InvalidChecksum);
        }
        Ok(packet)
    }

    /// Unframed bytes: id, payload, checksum
    pub fn to_frame(&self) -> Result<RawFrame, FrameError> {
        let mut out = RawFrame::new();
        out.push(self.msg_id)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        out.extend_from_slice(&self.payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        out.push(self.checksum)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(out)
    }

    /// SLIP-encode this packet into `buffer`
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        frame::encode(&self.to_frame()?, buffer)
    }

    /// SLIP-encode into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_ENCODED_SIZE>, FrameError> {
        frame::encode_to_vec(&self.to_frame()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDecoder;
    use proptest::prelude::*;

    #[test]
    fn test_new_computes_checksum() {
        let packet = Packet::new(0x05, &[0x01]).unwrap();
        assert_eq!(packet.checksum, 0x04);
        assert_eq!(packet.to_frame().unwrap().as_slice(), &[0x05, 0x01, 0x04]);
    }

    #[test]
    fn test_from_frame_too_short() {
        assert_eq!(Packet::from_frame(&[]), Err(FrameError::TooShort));
        assert_eq!(Packet::from_frame(&[0x03]), Err(FrameError::TooShort));
    }

    #[test]
    fn test_from_frame_empty_payload() {
        let packet = Packet::from_frame(&[0x03, 0x03]).unwrap();
        assert_eq!(packet.msg_id, 0x03);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_from_frame_bad_checksum() {
        assert_eq!(
            Packet::from_frame(&[0x05, 0x01, 0x05]),
            Err(FrameError::InvalidChecksum)
        );
    }

    #[test]
    fn test_payload_too_large() {
        let payload = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(Packet::new(0x42, &payload), Err(FrameError::PayloadTooLarge));
    }

    proptest! {
        #[test]
        fn prop_packet_survives_framing(
            msg_id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..MAX_PAYLOAD_SIZE),
        ) {
            let original = Packet::new(msg_id, &payload).unwrap();
            let wire = original.encode_to_vec().unwrap();

            let mut decoder = FrameDecoder::new();
            let frames: std::vec::Vec<_> = decoder.decode(&wire).collect();
            prop_assert_eq!(frames.len(), 1);

            let frame = frames[0].as_ref().unwrap();
            prop_assert_eq!(Packet::from_frame(frame).unwrap(), original);
        }

        /// Substituting one byte inside a frame changes exactly one
        /// unframed byte, or breaks an escape sequence.
        #[test]
        fn prop_wire_substitution_is_rejected(
            msg_id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..MAX_PAYLOAD_SIZE),
            index in any::<proptest::sample::Index>(),
            replacement in any::<u8>(),
        ) {
            prop_assume!(replacement != frame::END && replacement != frame::ESC);

            let original = Packet::new(msg_id, &payload).unwrap();
            let mut wire = original.encode_to_vec().unwrap();

            // Between the delimiters
            let i = 1 + index.index(wire.len() - 2);
            prop_assume!(wire[i] != replacement && wire[i] != frame::ESC);
            wire[i] = replacement;

            assert_nothing_accepted(&wire)?;
        }

        /// A stray ESC is reported as an invalid escape unless it lands in
        /// front of a byte that completes an escape sequence.
        #[test]
        fn prop_stray_escape_is_reported(
            msg_id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..MAX_PAYLOAD_SIZE),
            index in any::<proptest::sample::Index>(),
        ) {
            let original = Packet::new(msg_id, &payload).unwrap();
            let mut wire = original.encode_to_vec().unwrap();

            let i = 1 + index.index(wire.len() - 2);
            prop_assume!(wire[i] != frame::ESC);
            prop_assume!(wire[i + 1] != frame::ESC_END && wire[i + 1] != frame::ESC_ESC);
            wire[i] = frame::ESC;

            let mut decoder = FrameDecoder::new();
            let results: std::vec::Vec<_> = decoder.decode(&wire).collect();
            prop_assert!(results.contains(&Err(FrameError::InvalidEscape)));
            assert_nothing_accepted(&wire)?;
        }
    }

    fn assert_nothing_accepted(wire: &[u8]) -> Result<(), TestCaseError> {
        let mut decoder = FrameDecoder::new();
        for frame in decoder.decode(wire).flatten() {
            prop_assert!(Packet::from_frame(&frame).is_err(), "accepted {:02x?}", frame);
        }
        Ok(())
    }

    #[test]
    fn test_end_in_payload_splits_frame() {
        // SetSingle(0x28, 0x03) with its first payload byte hit by noise
        let mut wire = [0xC0, 0x28, 0x28, 0x03, 0x03, 0xC0];
        wire[2] = frame::END;

        let mut decoder = FrameDecoder::new();
        let frames: std::vec::Vec<_> = decoder.decode(&wire).collect();
        assert_eq!(frames.len(), 2);

        let head = frames[0].as_ref().unwrap();
        assert_eq!(Packet::from_frame(head), Err(FrameError::TooShort));

        // XOR cannot tell the trailing fragment from a real message
        let tail = frames[1].as_ref().unwrap();
        assert_eq!(Packet::from_frame(tail), Ok(Packet::empty(0x03)));
    }

    #[test]
    fn test_broken_escape_can_keep_checksum() {
        let original = Packet::new(0x01, &[frame::END]).unwrap();
        let mut wire = original.encode_to_vec().unwrap();
        assert_eq!(wire.as_slice(), &[0xC0, 0x01, 0xDB, 0xDC, 0xC1, 0xC0]);

        // 0x1C ^ ESC_END == END, so the XOR is unchanged
        wire[2] = 0x1C;

        let mut decoder = FrameDecoder::new();
        let frame = decoder.decode(&wire).next().unwrap().unwrap();
        let packet = Packet::from_frame(&frame).unwrap();
        assert_eq!(packet.payload.as_slice(), &[0x1C, 0xDC]);
        assert_ne!(packet, original);
    }
}
