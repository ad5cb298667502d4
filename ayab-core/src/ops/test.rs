//! Hardware test operation
//!
//! Answers the host's test commands with text and runs the two periodic
//! modes: `autoRead` prints the sensors and `autoTest` toggles the solenoid
//! bank between the even and odd halves.

use core::fmt::{self, Write};

use ayab_protocol::{DeviceMessage, API_VERSION, MAX_TEST_TEXT};
use heapless::String;

use super::Outbox;
use crate::encoders::EncoderSample;
use crate::fsm::TestCommand;
use crate::traits::{with_solenoid, BeepEvent};

/// Solenoid mask set on even auto-test ticks
pub const EVEN_SOLENOIDS: u16 = 0xAAAA;
/// Solenoid mask set on odd auto-test ticks
pub const ODD_SOLENOIDS: u16 = 0x5555;

const HELP: [&str; 4] = [
    "The following commands are available:\n",
    "setSingle [0..15] [1/0]\nsetAll [0..FFFF]\n",
    "readEOLsensors\nreadEncoders\nbeep\n",
    "autoRead\nautoTest\nsend\nstop\nquit\nhelp\n",
];

/// Payload echoed by the send command
const SEND_PAYLOAD: &str = "\u{1}\u{2}\u{3}\n";

/// Test mode bookkeeping
#[derive(Debug, Clone, Default)]
pub struct Tester {
    auto_read: bool,
    auto_test: bool,
    odd_tick: bool,
    last_tick_ms: u32,
}

impl Tester {
    pub const fn new() -> Self {
        Self {
            auto_read: false,
            auto_test: false,
            odd_tick: false,
            last_tick_ms: 0,
        }
    }

    /// Enter test mode: greet the host and list the commands
    pub fn begin(&mut self, now_ms: u32, version: [u8; 3], outbox: &mut Outbox) {
        *self = Self {
            last_tick_ms: now_ms,
            ..Self::new()
        };

        let [major, minor, patch] = version;
        say(
            outbox,
            format_args!(
                "AYAB Hardware Test, Firmware v{}.{}.{} API v{}\n\n",
                major, minor, patch, API_VERSION
            ),
        );
        help(outbox);
    }

    /// Leave test mode
    pub fn stop(&mut self) {
        self.auto_read = false;
        self.auto_test = false;
    }

    #[cfg(test)]
    fn is_auto(&self) -> bool {
        self.auto_read || self.auto_test
    }

    /// Run one test command against the current solenoid mask
    pub fn execute(
        &mut self,
        command: TestCommand,
        sample: &EncoderSample,
        mask: &mut u16,
        outbox: &mut Outbox,
    ) -> Option<BeepEvent> {
        match command {
            TestCommand::Help => help(outbox),
            TestCommand::Send => {
                say(outbox, format_args!("Called send\n"));
                say(outbox, format_args!("{}", SEND_PAYLOAD));
            }
            TestCommand::Beep => {
                say(outbox, format_args!("Called beep\n"));
                return Some(BeepEvent::Ready);
            }
            TestCommand::SetSingle { solenoid, on } => {
                say(outbox, format_args!("Called setSingle {} {}\n", solenoid, u8::from(on)));
                *mask = with_solenoid(*mask, solenoid, on);
            }
            TestCommand::SetAll(value) => {
                say(outbox, format_args!("Called setAll {:04X}\n", value));
                *mask = value;
            }
            TestCommand::ReadEolSensors => {
                say(outbox, format_args!("Called readEOLsensors\n"));
                eol_sensors(sample, outbox);
            }
            TestCommand::ReadEncoders => {
                say(outbox, format_args!("Called readEncoders\n"));
                encoders(sample, outbox);
            }
            TestCommand::AutoRead => {
                say(outbox, format_args!("Called autoRead, send stop to quit\n"));
                self.auto_read = true;
            }
            TestCommand::AutoTest => {
                say(outbox, format_args!("Called autoTest, send stop to quit\n"));
                self.auto_test = true;
            }
            TestCommand::Stop => {
                say(outbox, format_args!("Called stop\n"));
                self.stop();
            }
        }
        None
    }

    /// Run the periodic modes every `interval_ms`
    pub fn update(
        &mut self,
        now_ms: u32,
        interval_ms: u32,
        sample: &EncoderSample,
        mask: &mut u16,
        outbox: &mut Outbox,
    ) {
        if now_ms.wrapping_sub(self.last_tick_ms) < interval_ms {
            return;
        }
        self.last_tick_ms = now_ms;

        if self.auto_read && self.odd_tick {
            eol_sensors(sample, outbox);
            encoders(sample, outbox);
        }
        if self.auto_test {
            if self.odd_tick {
                say(outbox, format_args!("Set odd solenoids\n"));
                *mask = ODD_SOLENOIDS;
            } else {
                say(outbox, format_args!("Set even solenoids\n"));
                *mask = EVEN_SOLENOIDS;
            }
        }
        self.odd_tick = !self.odd_tick;
    }
}

/// Queue formatted text; output longer than one message is truncated
fn say(outbox: &mut Outbox, args: fmt::Arguments<'_>) {
    let mut text = String::<MAX_TEST_TEXT>::new();
    let _ = text.write_fmt(args);
    outbox.push(DeviceMessage::TestRes(text));
}

fn help(outbox: &mut Outbox) {
    for line in HELP {
        say(outbox, format_args!("{}", line));
    }
}

fn level(high: bool) -> &'static str {
    if high {
        "HIGH"
    } else {
        "LOW"
    }
}

fn eol_sensors(sample: &EncoderSample, outbox: &mut Outbox) {
    say(
        outbox,
        format_args!("  EOL_L: {}  EOL_R: {}\n", sample.hall_left, sample.hall_right),
    );
}

fn encoders(sample: &EncoderSample, outbox: &mut Outbox) {
    say(
        outbox,
        format_args!(
            "  ENC_A: {}  ENC_B: {}  ENC_C: {}\n",
            level(sample.enc_a),
            level(sample.enc_b),
            level(sample.enc_c)
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(outbox: &mut Outbox) -> std::vec::Vec<std::string::String> {
        let mut out = std::vec::Vec::new();
        while let Some(message) = outbox.pop() {
            match message {
                DeviceMessage::TestRes(text) => out.push(text.as_str().into()),
                other => panic!("unexpected message {:?}", other),
            }
        }
        out
    }

    #[test]
    fn test_begin_prints_banner_and_help() {
        let mut tester = Tester::new();
        let mut outbox = Outbox::new();
        tester.begin(0, [1, 0, 0], &mut outbox);

        let lines = texts(&mut outbox);
        assert_eq!(lines.len(), 1 + HELP.len());
        assert_eq!(lines[0], "AYAB Hardware Test, Firmware v1.0.0 API v6\n\n");
        assert!(lines[2].starts_with("setSingle"));
    }

    #[test]
    fn test_set_single_and_all() {
        let mut tester = Tester::new();
        let mut outbox = Outbox::new();
        let sample = EncoderSample::default();
        let mut mask = 0u16;

        tester.execute(TestCommand::SetSingle { solenoid: 4, on: true }, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, 0x0010);

        tester.execute(TestCommand::SetAll(0x0F0F), &sample, &mut mask, &mut outbox);
        assert_eq!(mask, 0x0F0F);

        tester.execute(TestCommand::SetSingle { solenoid: 0, on: false }, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, 0x0F0E);

        assert_eq!(texts(&mut outbox)[1], "Called setAll 0F0F\n");
    }

    #[test]
    fn test_read_sensors() {
        let mut tester = Tester::new();
        let mut outbox = Outbox::new();
        let sample = EncoderSample {
            enc_a: true,
            enc_c: true,
            hall_left: 412,
            hall_right: 87,
            ..EncoderSample::default()
        };
        let mut mask = 0;

        tester.execute(TestCommand::ReadEolSensors, &sample, &mut mask, &mut outbox);
        tester.execute(TestCommand::ReadEncoders, &sample, &mut mask, &mut outbox);

        let lines = texts(&mut outbox);
        assert_eq!(lines[1], "  EOL_L: 412  EOL_R: 87\n");
        assert_eq!(lines[3], "  ENC_A: HIGH  ENC_B: LOW  ENC_C: HIGH\n");
    }

    #[test]
    fn test_beep_command() {
        let mut tester = Tester::new();
        let mut outbox = Outbox::new();
        let mut mask = 0;
        let beep = tester.execute(TestCommand::Beep, &EncoderSample::default(), &mut mask, &mut outbox);
        assert_eq!(beep, Some(BeepEvent::Ready));
    }

    #[test]
    fn test_auto_test_alternates() {
        let mut tester = Tester::new();
        let mut outbox = Outbox::new();
        let sample = EncoderSample::default();
        let mut mask = 0;

        tester.begin(0, [1, 0, 0], &mut outbox);
        tester.execute(TestCommand::AutoTest, &sample, &mut mask, &mut outbox);
        assert!(tester.is_auto());
        outbox.clear();

        // Not yet due
        tester.update(499, 500, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, 0);

        tester.update(500, 500, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, EVEN_SOLENOIDS);
        tester.update(1000, 500, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, ODD_SOLENOIDS);
        tester.update(1500, 500, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, EVEN_SOLENOIDS);

        tester.execute(TestCommand::Stop, &sample, &mut mask, &mut outbox);
        assert!(!tester.is_auto());
        tester.update(2000, 500, &sample, &mut mask, &mut outbox);
        assert_eq!(mask, EVEN_SOLENOIDS);
    }

    #[test]
    fn test_auto_read_reports_every_other_tick() {
        let mut tester = Tester::new();
        let mut outbox = Outbox::new();
        let sample = EncoderSample::default();
        let mut mask = 0;

        tester.execute(TestCommand::AutoRead, &sample, &mut mask, &mut outbox);
        outbox.clear();

        tester.update(500, 500, &sample, &mut mask, &mut outbox);
        assert!(outbox.is_empty());
        tester.update(1000, 500, &sample, &mut mask, &mut outbox);
        assert_eq!(outbox.len(), 2);
    }
}
