//! Message table for the host protocol
//!
//! Message ids are divided into two categories:
//! - Host → Device: requests and test commands
//! - Device → Host: confirmations, line requests, status and test output
//!
//! Like the error codes, the ids are a versioned table bound to
//! [`API_VERSION`].

use heapless::{String, Vec};

use crate::error::ErrorCode;
use crate::frame::FrameError;
use crate::packet::{Packet, MAX_PAYLOAD_SIZE};

/// Protocol revision implemented by this table
pub const API_VERSION: u8 = 6;

// Message ids: Host → Device
pub const MSG_REQ_START: u8 = 0x01;
pub const MSG_REQ_INFO: u8 = 0x03;
pub const MSG_REQ_TEST: u8 = 0x04;
pub const MSG_REQ_INIT: u8 = 0x05;
pub const MSG_REQ_RESET: u8 = 0x0F;
pub const MSG_CNF_LINE: u8 = 0x42;
pub const MSG_HELP_CMD: u8 = 0x25;
pub const MSG_SEND_CMD: u8 = 0x26;
pub const MSG_BEEP_CMD: u8 = 0x27;
pub const MSG_SET_SINGLE_CMD: u8 = 0x28;
pub const MSG_SET_ALL_CMD: u8 = 0x29;
pub const MSG_READ_EOL_SENSORS_CMD: u8 = 0x2A;
pub const MSG_READ_ENCODERS_CMD: u8 = 0x2B;
pub const MSG_AUTO_READ_CMD: u8 = 0x2C;
pub const MSG_AUTO_TEST_CMD: u8 = 0x2D;
pub const MSG_STOP_CMD: u8 = 0x2E;
pub const MSG_QUIT_CMD: u8 = 0x2F;

// Message ids: Device → Host
pub const MSG_CNF_START: u8 = 0xC1;
pub const MSG_REQ_LINE: u8 = 0x82;
pub const MSG_CNF_INFO: u8 = 0xC3;
pub const MSG_CNF_TEST: u8 = 0xC4;
pub const MSG_IND_STATE: u8 = 0x84;
pub const MSG_CNF_INIT: u8 = 0xC5;
pub const MSG_TEST_RES: u8 = 0xEE;
pub const MSG_DEBUG: u8 = 0x9F;

/// Longest test-mode text line
pub const MAX_TEST_TEXT: usize = 48;

/// Known message ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageId {
    ReqStart = MSG_REQ_START,
    ReqInfo = MSG_REQ_INFO,
    ReqTest = MSG_REQ_TEST,
    ReqInit = MSG_REQ_INIT,
    ReqReset = MSG_REQ_RESET,
    CnfLine = MSG_CNF_LINE,
    HelpCmd = MSG_HELP_CMD,
    SendCmd = MSG_SEND_CMD,
    BeepCmd = MSG_BEEP_CMD,
    SetSingleCmd = MSG_SET_SINGLE_CMD,
    SetAllCmd = MSG_SET_ALL_CMD,
    ReadEolSensorsCmd = MSG_READ_EOL_SENSORS_CMD,
    ReadEncodersCmd = MSG_READ_ENCODERS_CMD,
    AutoReadCmd = MSG_AUTO_READ_CMD,
    AutoTestCmd = MSG_AUTO_TEST_CMD,
    StopCmd = MSG_STOP_CMD,
    QuitCmd = MSG_QUIT_CMD,
    CnfStart = MSG_CNF_START,
    ReqLine = MSG_REQ_LINE,
    CnfInfo = MSG_CNF_INFO,
    CnfTest = MSG_CNF_TEST,
    IndState = MSG_IND_STATE,
    CnfInit = MSG_CNF_INIT,
    TestRes = MSG_TEST_RES,
    Debug = MSG_DEBUG,
}

impl MessageId {
    /// Look up a wire id in the current table
    pub const fn from_byte(byte: u8) -> Option<Self> {
        use MessageId::*;

        Some(match byte {
            MSG_REQ_START => ReqStart,
            MSG_REQ_INFO => ReqInfo,
            MSG_REQ_TEST => ReqTest,
            MSG_REQ_INIT => ReqInit,
            MSG_REQ_RESET => ReqReset,
            MSG_CNF_LINE => CnfLine,
            MSG_HELP_CMD => HelpCmd,
            MSG_SEND_CMD => SendCmd,
            MSG_BEEP_CMD => BeepCmd,
            MSG_SET_SINGLE_CMD => SetSingleCmd,
            MSG_SET_ALL_CMD => SetAllCmd,
            MSG_READ_EOL_SENSORS_CMD => ReadEolSensorsCmd,
            MSG_READ_ENCODERS_CMD => ReadEncodersCmd,
            MSG_AUTO_READ_CMD => AutoReadCmd,
            MSG_AUTO_TEST_CMD => AutoTestCmd,
            MSG_STOP_CMD => StopCmd,
            MSG_QUIT_CMD => QuitCmd,
            MSG_CNF_START => CnfStart,
            MSG_REQ_LINE => ReqLine,
            MSG_CNF_INFO => CnfInfo,
            MSG_CNF_TEST => CnfTest,
            MSG_IND_STATE => IndState,
            MSG_CNF_INIT => CnfInit,
            MSG_TEST_RES => TestRes,
            MSG_DEBUG => Debug,
            _ => return None,
        })
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Whether the host is allowed to send this id
    pub const fn is_host_command(self) -> bool {
        use MessageId::*;

        matches!(
            self,
            ReqStart
                | ReqInfo
                | ReqTest
                | ReqInit
                | ReqReset
                | CnfLine
                | HelpCmd
                | SendCmd
                | BeepCmd
                | SetSingleCmd
                | SetAllCmd
                | ReadEolSensorsCmd
                | ReadEncodersCmd
                | AutoReadCmd
                | AutoTestCmd
                | StopCmd
                | QuitCmd
        )
    }

    /// Acknowledgement id for requests that have one
    pub const fn ack(self) -> Option<MessageId> {
        match self {
            MessageId::ReqInit => Some(MessageId::CnfInit),
            MessageId::ReqStart => Some(MessageId::CnfStart),
            MessageId::ReqTest => Some(MessageId::CnfTest),
            _ => None,
        }
    }

    /// Minimum payload length (excluding id and checksum)
    ///
    /// `CnfLine` additionally needs one line buffer, which depends on the
    /// machine; only its fixed header is counted here.
    pub const fn min_payload_len(self) -> usize {
        use MessageId::*;

        match self {
            ReqInit => 1,
            ReqStart => 3,
            CnfLine => 3,
            SetSingleCmd => 2,
            SetAllCmd => 2,
            _ => 0,
        }
    }
}

/// Machine status report payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateReport {
    pub error: ErrorCode,
    pub state: u8,
    pub hall_left: u16,
    pub hall_right: u16,
    pub carriage: u8,
    pub position: u8,
    pub direction: u8,
}

/// Messages from the device to the host
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMessage {
    /// Reply to a machine-type init request
    CnfInit(ErrorCode),
    /// Reply to a start-knit request
    CnfStart(ErrorCode),
    /// Reply to a start-test request
    CnfTest(ErrorCode),
    /// Firmware identification
    CnfInfo {
        api_version: u8,
        major: u8,
        minor: u8,
        patch: u8,
    },
    /// Ask the host for pattern line `line_number`
    ReqLine { line_number: u8, error: ErrorCode },
    /// Status report
    IndState(StateReport),
    /// Test-mode text output
    TestRes(String<MAX_TEST_TEXT>),
}

impl DeviceMessage {
    /// Wire id of this message
    pub fn id(&self) -> MessageId {
        match self {
            DeviceMessage::CnfInit(_) => MessageId::CnfInit,
            DeviceMessage::CnfStart(_) => MessageId::CnfStart,
            DeviceMessage::CnfTest(_) => MessageId::CnfTest,
            DeviceMessage::CnfInfo { .. } => MessageId::CnfInfo,
            DeviceMessage::ReqLine { .. } => MessageId::ReqLine,
            DeviceMessage::IndState(_) => MessageId::IndState,
            DeviceMessage::TestRes(_) => MessageId::TestRes,
        }
    }

    /// Acknowledgement for a request id, if that request has one
    pub fn ack_for(id: MessageId, code: ErrorCode) -> Option<Self> {
        match id.ack()? {
            MessageId::CnfInit => Some(DeviceMessage::CnfInit(code)),
            MessageId::CnfStart => Some(DeviceMessage::CnfStart(code)),
            MessageId::CnfTest => Some(DeviceMessage::CnfTest(code)),
            _ => None,
        }
    }

    /// Encode this message into a packet
    pub fn to_packet(&self) -> Result<Packet, FrameError> {
        let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();

        match self {
            DeviceMessage::CnfInit(code)
            | DeviceMessage::CnfStart(code)
            | DeviceMessage::CnfTest(code) => {
                payload
                    .push(code.to_byte())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
            }
            DeviceMessage::CnfInfo {
                api_version,
                major,
                minor,
                patch,
            } => {
                payload
                    .extend_from_slice(&[*api_version, *major, *minor, *patch])
                    .map_err(|_| FrameError::PayloadTooLarge)?;
            }
            DeviceMessage::ReqLine { line_number, error } => {
                payload
                    .extend_from_slice(&[*line_number, error.to_byte()])
                    .map_err(|_| FrameError::PayloadTooLarge)?;
            }
            DeviceMessage::IndState(report) => {
                // Payload: [err][state][hallL hi][hallL lo][hallR hi][hallR lo][carriage][pos][dir]
                let [l_hi, l_lo] = report.hall_left.to_be_bytes();
                let [r_hi, r_lo] = report.hall_right.to_be_bytes();
                payload
                    .extend_from_slice(&[
                        report.error.to_byte(),
                        report.state,
                        l_hi,
                        l_lo,
                        r_hi,
                        r_lo,
                        report.carriage,
                        report.position,
                        report.direction,
                    ])
                    .map_err(|_| FrameError::PayloadTooLarge)?;
            }
            DeviceMessage::TestRes(text) => {
                payload
                    .extend_from_slice(text.as_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
            }
        }

        Packet::new(self.id().to_byte(), &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_table_round_trips() {
        for byte in 0..=u8::MAX {
            if let Some(id) = MessageId::from_byte(byte) {
                assert_eq!(id.to_byte(), byte);
            }
        }
        assert_eq!(MessageId::from_byte(0x00), None);
        assert_eq!(MessageId::from_byte(0x30), None);
    }

    #[test]
    fn test_direction_split() {
        assert!(MessageId::ReqInit.is_host_command());
        assert!(MessageId::CnfLine.is_host_command());
        assert!(MessageId::QuitCmd.is_host_command());
        assert!(!MessageId::CnfInit.is_host_command());
        assert!(!MessageId::IndState.is_host_command());
        assert!(!MessageId::TestRes.is_host_command());
    }

    #[test]
    fn test_acks() {
        assert_eq!(
            DeviceMessage::ack_for(MessageId::ReqStart, ErrorCode::NoCarriage),
            Some(DeviceMessage::CnfStart(ErrorCode::NoCarriage))
        );
        assert_eq!(DeviceMessage::ack_for(MessageId::CnfLine, ErrorCode::Success), None);
    }

    #[test]
    fn test_cnf_init_encoding() {
        let packet = DeviceMessage::CnfInit(ErrorCode::Success).to_packet().unwrap();
        assert_eq!(packet.to_frame().unwrap().as_slice(), &[0xC5, 0x00, 0xC5]);
    }

    #[test]
    fn test_ind_state_encoding() {
        let msg = DeviceMessage::IndState(StateReport {
            error: ErrorCode::Success,
            state: 2,
            hall_left: 0x0123,
            hall_right: 0x0456,
            carriage: 0,
            position: 42,
            direction: 1,
        });
        let packet = msg.to_packet().unwrap();
        assert_eq!(packet.msg_id, MSG_IND_STATE);
        assert_eq!(
            packet.payload.as_slice(),
            &[0x00, 2, 0x01, 0x23, 0x04, 0x56, 0, 42, 1]
        );
    }

    #[test]
    fn test_req_line_encoding() {
        let msg = DeviceMessage::ReqLine {
            line_number: 7,
            error: ErrorCode::Success,
        };
        let packet = msg.to_packet().unwrap();
        assert_eq!(packet.payload.as_slice(), &[7, 0]);
    }

    #[test]
    fn test_test_res_encoding() {
        let mut text: String<MAX_TEST_TEXT> = String::new();
        text.push_str("Called beep\n").unwrap();
        let packet = DeviceMessage::TestRes(text).to_packet().unwrap();
        assert_eq!(packet.msg_id, MSG_TEST_RES);
        assert_eq!(packet.payload.as_slice(), b"Called beep\n");
    }
}
