//! Protocol state machine
//!
//! Gates every host message against the current operating state. A message
//! is checked completely before anything changes: length, id, machine
//! type, state legality, then payload. Only a fully valid message moves the
//! state and yields a [`Command`] for the controller to carry out.

use ayab_protocol::{ErrorCode, MessageId};
use heapless::Vec;

use crate::encoders::EncoderSnapshot;
use crate::machine::{Carriage, MachineType, MAX_LINE_BUFFER_LEN};
use crate::state::{Event, OperatingState};

/// Start-knit flag: report state on every needle
pub const FLAG_CONTINUOUS_REPORTING: u8 = 0x01;
/// Start-knit flag: audible notifications
pub const FLAG_BEEPER: u8 = 0x02;
/// Line flag: this is the final pattern line
pub const FLAG_LAST_LINE: u8 = 0x01;

/// Highest solenoid index the test commands accept
const MAX_SOLENOID: u8 = 15;

/// Validated start-knit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnitJob {
    pub start_needle: u8,
    pub stop_needle: u8,
    pub continuous_reporting: bool,
    pub beeper: bool,
}

/// Validated pattern line
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineData {
    pub line_number: u8,
    pub color: u8,
    pub last_line: bool,
    pub pattern: Vec<u8, MAX_LINE_BUFFER_LEN>,
}

/// Hardware test commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestCommand {
    Help,
    Send,
    Beep,
    SetSingle { solenoid: u8, on: bool },
    SetAll(u16),
    ReadEolSensors,
    ReadEncoders,
    AutoRead,
    AutoTest,
    Stop,
}

/// Side effects of an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Info,
    Init(MachineType),
    StartKnit(KnitJob),
    StartTest,
    Line(LineData),
    Stop,
    Reset,
    Test(TestCommand),
}

/// Outcome of dispatching one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub code: ErrorCode,
    /// New state, if the message changed it
    pub next: Option<OperatingState>,
    /// Present only on success
    pub command: Option<Command>,
}

/// Single owner of the operating state
#[derive(Debug, Clone, Default)]
pub struct ProtocolFsm {
    state: OperatingState,
    machine: Option<MachineType>,
}

impl ProtocolFsm {
    pub const fn new() -> Self {
        Self {
            state: OperatingState::WaitForMachine,
            machine: None,
        }
    }

    pub fn state(&self) -> OperatingState {
        self.state
    }

    pub fn machine_type(&self) -> Option<MachineType> {
        self.machine
    }

    /// Validate and apply one host message
    pub fn dispatch(&mut self, msg_id: u8, payload: &[u8], facts: &EncoderSnapshot) -> Dispatch {
        match self.validate(msg_id, payload, facts) {
            Ok((command, event)) => {
                if let Command::Init(machine) = command {
                    self.machine = Some(machine);
                }
                let next = event.and_then(|e| self.apply(e));
                Dispatch {
                    code: ErrorCode::Success,
                    next,
                    command: Some(command),
                }
            }
            Err(code) => Dispatch {
                code,
                next: self.fault(code),
                command: None,
            },
        }
    }

    /// Apply an internal event; returns the new state if it changed
    pub fn apply(&mut self, event: Event) -> Option<OperatingState> {
        let next = self.state.transition(event);
        if next == self.state {
            return None;
        }
        if next == OperatingState::WaitForMachine {
            self.machine = None;
        }
        self.state = next;
        Some(next)
    }

    /// Apply the severity policy of `code`
    pub fn fault(&mut self, code: ErrorCode) -> Option<OperatingState> {
        code.severity().and_then(|s| self.apply(Event::Fault(s)))
    }

    fn validate(
        &self,
        msg_id: u8,
        payload: &[u8],
        facts: &EncoderSnapshot,
    ) -> Result<(Command, Option<Event>), ErrorCode> {
        let id = MessageId::from_byte(msg_id).ok_or(ErrorCode::UnrecognizedMsgId)?;
        if !id.is_host_command() {
            return Err(ErrorCode::UnexpectedMsgId);
        }

        let mut min_len = id.min_payload_len();
        if id == MessageId::CnfLine {
            min_len += self
                .machine
                .map_or(0, |m| usize::from(m.geometry().line_buffer_len));
        }
        if payload.len() < min_len {
            return Err(ErrorCode::ExpectedLongerMessage);
        }

        let machine = match (needs_machine(id), self.machine) {
            (true, None) => return Err(ErrorCode::NoMachineType),
            (_, machine) => machine,
        };

        self.check_state(id, payload)?;

        let command = parse(id, payload, machine, facts)?;
        Ok((command, event_for(id)))
    }

    fn check_state(&self, id: MessageId, payload: &[u8]) -> Result<(), ErrorCode> {
        use OperatingState::*;

        let legal: &[OperatingState] = match id {
            MessageId::ReqInfo => &[WaitForMachine, Init, Ready, Knit, Test, Error],
            MessageId::ReqInit => &[WaitForMachine],
            MessageId::ReqStart | MessageId::ReqTest => &[Ready],
            MessageId::CnfLine => &[Knit],
            MessageId::QuitCmd => &[Knit, Test],
            MessageId::ReqReset => &[Error],
            _ => &[Test],
        };

        if legal.contains(&self.state) {
            Ok(())
        } else if target_state(id) == Some(self.state) && self.is_resend(id, payload) {
            Err(ErrorCode::UnexpectedMsgId)
        } else {
            Err(ErrorCode::WrongMachineState)
        }
    }

    /// Whether `id` repeats the command that led to the current state
    fn is_resend(&self, id: MessageId, payload: &[u8]) -> bool {
        match id {
            MessageId::ReqInit => self.machine.map(MachineType::to_wire) == payload.first().copied(),
            _ => true,
        }
    }
}

fn needs_machine(id: MessageId) -> bool {
    matches!(id, MessageId::ReqStart | MessageId::ReqTest | MessageId::CnfLine)
}

fn target_state(id: MessageId) -> Option<OperatingState> {
    match id {
        MessageId::ReqInit => Some(OperatingState::Init),
        MessageId::ReqStart => Some(OperatingState::Knit),
        MessageId::ReqTest => Some(OperatingState::Test),
        MessageId::QuitCmd => Some(OperatingState::Ready),
        MessageId::ReqReset => Some(OperatingState::WaitForMachine),
        _ => None,
    }
}

fn event_for(id: MessageId) -> Option<Event> {
    match id {
        MessageId::ReqInit => Some(Event::MachineIdentified),
        MessageId::ReqStart => Some(Event::StartKnit),
        MessageId::ReqTest => Some(Event::StartTest),
        MessageId::QuitCmd => Some(Event::Stop),
        MessageId::ReqReset => Some(Event::Reset),
        _ => None,
    }
}

/// Payload checks; lengths were verified by the caller
fn parse(
    id: MessageId,
    payload: &[u8],
    machine: Option<MachineType>,
    facts: &EncoderSnapshot,
) -> Result<Command, ErrorCode> {
    let command = match id {
        MessageId::ReqInfo => Command::Info,
        MessageId::ReqInit => Command::Init(MachineType::from_wire(payload[0])?),
        MessageId::ReqStart => {
            let machine = machine.ok_or(ErrorCode::NoMachineType)?;
            Command::StartKnit(parse_job(payload, machine, facts)?)
        }
        MessageId::ReqTest => Command::StartTest,
        MessageId::CnfLine => {
            let machine = machine.ok_or(ErrorCode::NoMachineType)?;
            let len = usize::from(machine.geometry().line_buffer_len);
            let pattern =
                Vec::from_slice(&payload[3..3 + len]).map_err(|_| ErrorCode::ArgumentInvalid)?;
            Command::Line(LineData {
                line_number: payload[0],
                color: payload[1],
                last_line: payload[2] & FLAG_LAST_LINE != 0,
                pattern,
            })
        }
        MessageId::QuitCmd => Command::Stop,
        MessageId::ReqReset => Command::Reset,
        MessageId::HelpCmd => Command::Test(TestCommand::Help),
        MessageId::SendCmd => Command::Test(TestCommand::Send),
        MessageId::BeepCmd => Command::Test(TestCommand::Beep),
        MessageId::SetSingleCmd => {
            let (solenoid, value) = (payload[0], payload[1]);
            if solenoid > MAX_SOLENOID || value > 1 {
                return Err(ErrorCode::ArgumentInvalid);
            }
            Command::Test(TestCommand::SetSingle {
                solenoid,
                on: value == 1,
            })
        }
        MessageId::SetAllCmd => {
            Command::Test(TestCommand::SetAll(u16::from_be_bytes([payload[0], payload[1]])))
        }
        MessageId::ReadEolSensorsCmd => Command::Test(TestCommand::ReadEolSensors),
        MessageId::ReadEncodersCmd => Command::Test(TestCommand::ReadEncoders),
        MessageId::AutoReadCmd => Command::Test(TestCommand::AutoRead),
        MessageId::AutoTestCmd => Command::Test(TestCommand::AutoTest),
        MessageId::StopCmd => Command::Test(TestCommand::Stop),
        // Device-originated ids were rejected earlier
        _ => return Err(ErrorCode::UnexpectedMsgId),
    };
    Ok(command)
}

fn parse_job(payload: &[u8], machine: MachineType, facts: &EncoderSnapshot) -> Result<KnitJob, ErrorCode> {
    let (start_needle, stop_needle, flags) = (payload[0], payload[1], payload[2]);
    let geometry = machine.geometry();

    if start_needle > stop_needle || stop_needle >= geometry.num_needles {
        return Err(ErrorCode::NeedleValueInvalid);
    }
    if flags & !(FLAG_CONTINUOUS_REPORTING | FLAG_BEEPER) != 0 {
        return Err(ErrorCode::ArgumentInvalid);
    }

    if facts.machine_type()? != machine {
        return Err(ErrorCode::ArgumentsIncompatible);
    }
    let carriage = facts.carriage()?;
    facts.direction()?;
    if machine != MachineType::Kh270 {
        facts.belt_shift()?;
    }

    if machine == MachineType::Kh270 && carriage != Carriage::Knit {
        return Err(ErrorCode::ArgumentsIncompatible);
    }

    Ok(KnitJob {
        start_needle,
        stop_needle,
        continuous_reporting: flags & FLAG_CONTINUOUS_REPORTING != 0,
        beeper: flags & FLAG_BEEPER != 0,
    })
}
