//! GPIO beeper
//!
//! Drives a piezo buzzer from a plain output pin. Patterns are played
//! from `update`, one edge per `BEEP_DELAY_MS`, so notifying never blocks
//! the control loop.

use ayab_core::traits::{BeepEvent, Beeper, BEEP_DELAY_MS};
use embedded_hal::digital::OutputPin;

/// Piezo beeper on one output pin
pub struct GpioBeeper<P> {
    pin: P,
    /// Edges left in the current pattern
    edges: u8,
    /// Time of the next edge, `None` to start on the next update
    due_ms: Option<u32>,
    high: bool,
}

impl<P: OutputPin> GpioBeeper<P> {
    pub fn new(pin: P) -> Self {
        let mut beeper = Self {
            pin,
            edges: 0,
            due_ms: None,
            high: true,
        };
        beeper.set(false);
        beeper
    }

    /// Check if a pattern is playing
    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.edges > 0
    }

    fn set(&mut self, high: bool) {
        if high == self.high {
            return;
        }
        self.high = high;
        // Pin errors leave the beeper silent
        let _ = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

impl<P: OutputPin> Beeper for GpioBeeper<P> {
    fn notify(&mut self, event: BeepEvent) {
        self.set(false);
        self.edges = event.count() * 2;
        self.due_ms = None;
    }

    fn update(&mut self, now_ms: u32) {
        if self.edges == 0 {
            return;
        }
        if let Some(due) = self.due_ms {
            if (now_ms.wrapping_sub(due) as i32) < 0 {
                return;
            }
        }

        self.set(!self.high);
        self.edges -= 1;
        self.due_ms = Some(now_ms.wrapping_add(BEEP_DELAY_MS));
    }
}
