//! Beeper trait

/// Length of one beep and of the pause after it
pub const BEEP_DELAY_MS: u32 = 50;

/// Things worth telling the operator about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeepEvent {
    /// Machine is ready or knitting started
    Ready,
    /// A new line was accepted
    EndOfLine,
    /// The last line is done
    EndOfWork,
    /// Entered the error state
    Error,
}

impl BeepEvent {
    /// Number of beeps in the pattern
    pub const fn count(self) -> u8 {
        match self {
            BeepEvent::Ready => 5,
            BeepEvent::EndOfLine => 3,
            BeepEvent::EndOfWork => 10,
            BeepEvent::Error => 8,
        }
    }
}

/// Operator notification output
///
/// `notify` must not block; implementations play the pattern from
/// `update`, which the control loop calls every cycle.
pub trait Beeper {
    /// Start the pattern for `event`, replacing any pattern in progress
    fn notify(&mut self, event: BeepEvent);

    /// Advance the current pattern
    fn update(&mut self, now_ms: u32);
}
