//! Machine controller
//!
//! Ties the encoder tracker, the protocol state machine and the per-state
//! operations to the solenoid bank and the beeper. The firmware feeds it
//! encoder samples and host frames, calls [`Controller::update`] once per
//! control cycle and drains [`Controller::poll_outgoing`] to the host.

use ayab_protocol::{DeviceMessage, ErrorCode, MessageId, Packet, API_VERSION};

use crate::config::FirmwareConfig;
use crate::encoders::{EncoderSample, EncoderSnapshot, Encoders};
use crate::fsm::{Command, ProtocolFsm};
use crate::machine::{MachineType, SOLENOIDS_BITMASK};
use crate::ops::{InitDetector, KnitActions, Knitter, LineOutcome, Outbox, Tester};
use crate::safety::{CarriageWatchdog, SafetyStatus};
use crate::state::{Event, OperatingState};
use crate::traits::{with_solenoid, BeepEvent, Beeper, SolenoidBank};

/// Firmware version reported to the host
pub const FIRMWARE_VERSION: [u8; 3] = [1, 0, 0];

/// Knitting machine controller
pub struct Controller<S, B> {
    config: FirmwareConfig,
    encoders: Encoders,
    fsm: ProtocolFsm,
    init: InitDetector,
    knitter: Knitter,
    tester: Tester,
    watchdog: CarriageWatchdog,
    solenoids: S,
    beeper: B,
    outbox: Outbox,
    /// Mask the solenoids should show
    mask: u16,
    /// Mask last written to the bank
    written: Option<u16>,
    beeper_enabled: bool,
    last_sample: EncoderSample,
    /// Error repeated to the host while in the error state
    last_error: ErrorCode,
    last_status_ms: u32,
    now_ms: u32,
}

impl<S: SolenoidBank, B: Beeper> Controller<S, B> {
    pub fn new(config: FirmwareConfig, solenoids: S, beeper: B) -> Self {
        Self {
            config,
            encoders: Encoders::new(),
            fsm: ProtocolFsm::new(),
            init: InitDetector::new(),
            knitter: Knitter::new(),
            tester: Tester::new(),
            watchdog: CarriageWatchdog::from_config(&config),
            solenoids,
            beeper,
            outbox: Outbox::new(),
            mask: 0,
            written: None,
            beeper_enabled: config.beeper_enabled,
            last_sample: EncoderSample::default(),
            last_error: ErrorCode::Success,
            last_status_ms: 0,
            now_ms: 0,
        }
    }

    pub fn state(&self) -> OperatingState {
        self.fsm.state()
    }

    pub fn machine_type(&self) -> Option<MachineType> {
        self.fsm.machine_type()
    }

    /// Carriage facts as of the last sample
    pub fn facts(&self) -> EncoderSnapshot {
        self.encoders.peek()
    }

    /// Mask the solenoids will show after the next update
    pub fn mask(&self) -> u16 {
        self.mask
    }

    pub fn solenoids(&self) -> &S {
        &self.solenoids
    }

    pub fn beeper(&self) -> &B {
        &self.beeper
    }

    /// Messages lost to a full outbox
    pub fn dropped_messages(&self) -> u32 {
        self.outbox.dropped()
    }

    /// Process one encoder sample
    ///
    /// Returns the tracker's error for this sample. A clamp while a row is
    /// being knitted is escalated by the watchdog on the next update.
    pub fn on_sample(&mut self, sample: &EncoderSample) -> Result<(), ErrorCode> {
        self.last_sample = *sample;
        let result = self.encoders.on_sample(sample);

        if result == Err(ErrorCode::NeedleValueInvalid) {
            self.watchdog.clamped(self.knitter.row_in_progress());
        }

        if self.fsm.state() == OperatingState::Knit {
            let actions = self.knitter.step(&self.encoders.peek());
            self.apply_knit(actions);
        }
        result
    }

    /// Process one unframed host packet
    ///
    /// Every failure is answered to the host; the returned code is the one
    /// sent back.
    pub fn on_frame(&mut self, frame: &[u8]) -> ErrorCode {
        let packet = match Packet::from_frame(frame) {
            Ok(packet) => packet,
            Err(e) => {
                let code = ErrorCode::from(e);
                self.report(code);
                return code;
            }
        };

        let facts = self.encoders.peek();
        let dispatch = self.fsm.dispatch(packet.msg_id, &packet.payload, &facts);

        let code = match dispatch.command {
            Some(command) => self.execute(command),
            None => {
                self.reply_failure(packet.msg_id, dispatch.code);
                dispatch.code
            }
        };

        if let Some(next) = dispatch.next {
            self.enter(next);
        }
        code
    }

    /// Run one control cycle and write the solenoids if they changed
    pub fn update(&mut self, now_ms: u32) -> Result<(), S::Error> {
        self.now_ms = now_ms;
        let facts = self.encoders.snapshot();

        if let Some(fault) = facts.fault {
            self.report(fault);
        }

        match self.fsm.state() {
            OperatingState::Init => {
                if self.init.is_ready(&facts) {
                    if let Some(next) = self.fsm.apply(Event::InitComplete) {
                        self.enter(next);
                        self.report(ErrorCode::Success);
                        self.beep(BeepEvent::Ready);
                    }
                }
            }
            OperatingState::Knit => {
                self.watchdog
                    .observe(now_ms, facts.position, self.knitter.row_in_progress());
                if let SafetyStatus::Fault(code) = self.watchdog.check(now_ms) {
                    self.fail(code);
                }
            }
            OperatingState::Test => {
                self.tester.update(
                    now_ms,
                    self.config.test_interval_ms,
                    &self.last_sample,
                    &mut self.mask,
                    &mut self.outbox,
                );
            }
            OperatingState::Error => {
                if now_ms.wrapping_sub(self.last_status_ms) >= self.config.status_interval_ms {
                    self.last_status_ms = now_ms;
                    self.report(self.last_error);
                }
            }
            OperatingState::WaitForMachine | OperatingState::Ready => {}
        }

        self.beeper.update(now_ms);

        if self.written != Some(self.mask) {
            self.solenoids.write(self.mask)?;
            self.written = Some(self.mask);
        }
        Ok(())
    }

    /// Next message for the host
    pub fn poll_outgoing(&mut self) -> Option<DeviceMessage> {
        self.outbox.pop()
    }

    /// Carry out an accepted command; state entry happens afterwards
    fn execute(&mut self, command: Command) -> ErrorCode {
        match command {
            Command::Info => {
                let [major, minor, patch] = FIRMWARE_VERSION;
                self.outbox.push(DeviceMessage::CnfInfo {
                    api_version: API_VERSION,
                    major,
                    minor,
                    patch,
                });
            }
            Command::Init(machine) => {
                self.encoders.init(machine);
                self.init.reset();
                self.outbox.push(DeviceMessage::CnfInit(ErrorCode::Success));
            }
            Command::StartKnit(job) => {
                self.beeper_enabled = self.config.beeper_enabled && job.beeper;
                self.watchdog.arm(self.now_ms);
                self.outbox.push(DeviceMessage::CnfStart(ErrorCode::Success));
                let actions = self.knitter.begin(job);
                self.apply_knit(actions);
            }
            Command::StartTest => {
                self.outbox.push(DeviceMessage::CnfTest(ErrorCode::Success));
                self.tester
                    .begin(self.now_ms, FIRMWARE_VERSION, &mut self.outbox);
            }
            Command::Line(line) => match self.knitter.accept_line(&line) {
                LineOutcome::Accepted => {
                    self.watchdog.line_received();
                    self.beep(BeepEvent::EndOfLine);
                }
                LineOutcome::Mismatch { requested } => {
                    self.request_line(requested);
                }
                LineOutcome::NotRequested => {
                    self.report(ErrorCode::UnexpectedMsgId);
                    return ErrorCode::UnexpectedMsgId;
                }
            },
            Command::Test(test) => {
                let beep = self.tester.execute(
                    test,
                    &self.last_sample,
                    &mut self.mask,
                    &mut self.outbox,
                );
                if let Some(event) = beep {
                    self.beep(event);
                }
            }
            // Handled by the state entry
            Command::Stop | Command::Reset => {}
        }
        ErrorCode::Success
    }

    /// Side effects of entering `state`
    fn enter(&mut self, state: OperatingState) {
        match state {
            OperatingState::WaitForMachine => {
                self.encoders.reset();
                self.init.reset();
                self.stop_work();
                self.mask = 0;
                self.last_error = ErrorCode::Success;
            }
            OperatingState::Ready => {
                self.stop_work();
                self.mask = SOLENOIDS_BITMASK;
            }
            OperatingState::Error => {
                self.stop_work();
                self.mask = 0;
                self.last_status_ms = self.now_ms;
                self.report(self.last_error);
                self.beep(BeepEvent::Error);
            }
            // Set up by the command that caused the transition
            OperatingState::Init | OperatingState::Knit | OperatingState::Test => {}
        }
    }

    fn stop_work(&mut self) {
        self.knitter.stop();
        self.tester.stop();
        self.watchdog.disarm();
        self.beeper_enabled = self.config.beeper_enabled;
    }

    /// Apply an internal fault
    fn fail(&mut self, code: ErrorCode) {
        self.last_error = code;
        if let Some(next) = self.fsm.fault(code) {
            self.enter(next);
        }
    }

    fn apply_knit(&mut self, actions: KnitActions) {
        if let Some((index, on)) = actions.solenoid {
            self.mask = with_solenoid(self.mask, index, on);
        }
        if actions.report {
            self.report(ErrorCode::Success);
        }
        if let Some(line_number) = actions.request_line {
            self.request_line(line_number);
        }
        if let Some(event) = actions.beep {
            self.beep(event);
        }
        if actions.complete {
            if let Some(next) = self.fsm.apply(Event::WorkComplete) {
                self.enter(next);
            }
        }
    }

    fn request_line(&mut self, line_number: u8) {
        self.watchdog.line_requested(self.now_ms);
        self.outbox.push(DeviceMessage::ReqLine {
            line_number,
            error: ErrorCode::Success,
        });
    }

    /// Requests with an acknowledgement carry the code there; everything
    /// else gets a status report
    fn reply_failure(&mut self, msg_id: u8, code: ErrorCode) {
        let ack = MessageId::from_byte(msg_id).and_then(|id| DeviceMessage::ack_for(id, code));
        match ack {
            Some(message) => {
                self.outbox.push(message);
            }
            None => self.report(code),
        }
    }

    fn report(&mut self, code: ErrorCode) {
        let report = self.encoders.peek().report(code, self.fsm.state().wire());
        self.outbox.push(DeviceMessage::IndState(report));
    }

    fn beep(&mut self, event: BeepEvent) {
        if self.beeper_enabled {
            self.beeper.notify(event);
        }
    }
}
