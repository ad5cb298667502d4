//! Events that trigger state transitions

use ayab_protocol::Severity;

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Host requests
    /// Host selected a valid machine type
    MachineIdentified,
    /// Host asked to start knitting
    StartKnit,
    /// Host asked for hardware test mode
    StartTest,
    /// Host asked to leave knitting or test mode
    Stop,
    /// Host asked to clear the error state
    Reset,

    // Operation events
    /// Carriage passed a hall sensor, geometry is anchored
    InitComplete,
    /// Last pattern line finished
    WorkComplete,

    // Fault events
    /// An error of the given severity occurred
    Fault(Severity),
}
