//! Operating state definition
//!
//! Every solenoid and host-protocol behavior is a function of the current
//! state and an event.

use ayab_protocol::Severity;

use super::events::Event;

/// Operating states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingState {
    /// Power-on, no machine type selected
    #[default]
    WaitForMachine,
    /// Machine type known, waiting for the carriage to pass a hall sensor
    Init,
    /// Position anchored, waiting for a knit or test request
    Ready,
    /// Knitting a pattern
    Knit,
    /// Hardware test mode
    Test,
    /// Critical or fatal fault; only a reset leaves this state
    Error,
}

impl OperatingState {
    /// Wire value used in status reports
    pub const fn wire(self) -> u8 {
        match self {
            OperatingState::WaitForMachine => 0,
            OperatingState::Init => 1,
            OperatingState::Ready => 2,
            OperatingState::Knit => 3,
            OperatingState::Test => 4,
            OperatingState::Error => 5,
        }
    }

    /// Safe state to fall back to after a recoverable error
    pub fn fallback(self) -> Self {
        match self {
            OperatingState::Knit | OperatingState::Test => OperatingState::Ready,
            other => other,
        }
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use OperatingState::*;

        match (self, event) {
            // Critical and fatal faults win from any state
            (_, Fault(Severity::Critical | Severity::Fatal)) => Error,
            (_, Fault(Severity::Recoverable)) => self.fallback(),

            (WaitForMachine, MachineIdentified) => Init,

            (Init, InitComplete) => Ready,

            (Ready, StartKnit) => Knit,
            (Ready, StartTest) => Test,

            (Knit, WorkComplete) => Ready,
            (Knit, Stop) => Ready,

            (Test, Stop) => Ready,

            (Error, Reset) => WaitForMachine,

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OperatingState; 6] = [
        OperatingState::WaitForMachine,
        OperatingState::Init,
        OperatingState::Ready,
        OperatingState::Knit,
        OperatingState::Test,
        OperatingState::Error,
    ];

    #[test]
    fn test_happy_path() {
        let state = OperatingState::default()
            .transition(Event::MachineIdentified)
            .transition(Event::InitComplete)
            .transition(Event::StartKnit);
        assert_eq!(state, OperatingState::Knit);

        assert_eq!(state.transition(Event::WorkComplete), OperatingState::Ready);
        assert_eq!(state.transition(Event::Stop), OperatingState::Ready);
    }

    #[test]
    fn test_test_mode() {
        let test = OperatingState::Ready.transition(Event::StartTest);
        assert_eq!(test, OperatingState::Test);
        assert_eq!(test.transition(Event::Stop), OperatingState::Ready);
        assert_eq!(test.transition(Event::WorkComplete), OperatingState::Test);
    }

    #[test]
    fn test_critical_from_any_state() {
        for state in ALL {
            assert_eq!(
                state.transition(Event::Fault(Severity::Critical)),
                OperatingState::Error
            );
            assert_eq!(
                state.transition(Event::Fault(Severity::Fatal)),
                OperatingState::Error
            );
        }
    }

    #[test]
    fn test_warning_changes_nothing() {
        for state in ALL {
            assert_eq!(state.transition(Event::Fault(Severity::Warning)), state);
        }
    }

    #[test]
    fn test_recoverable_falls_back() {
        assert_eq!(
            OperatingState::Knit.transition(Event::Fault(Severity::Recoverable)),
            OperatingState::Ready
        );
        assert_eq!(
            OperatingState::WaitForMachine.transition(Event::Fault(Severity::Recoverable)),
            OperatingState::WaitForMachine
        );
    }

    #[test]
    fn test_only_reset_leaves_error() {
        let events = [
            Event::MachineIdentified,
            Event::InitComplete,
            Event::StartKnit,
            Event::StartTest,
            Event::Stop,
            Event::WorkComplete,
        ];
        for event in events {
            assert_eq!(OperatingState::Error.transition(event), OperatingState::Error);
        }
        assert_eq!(
            OperatingState::Error.transition(Event::Reset),
            OperatingState::WaitForMachine
        );
    }

    #[test]
    fn test_no_skipping_init() {
        assert_eq!(
            OperatingState::WaitForMachine.transition(Event::StartKnit),
            OperatingState::WaitForMachine
        );
        assert_eq!(OperatingState::Init.transition(Event::StartTest), OperatingState::Init);
    }
}
