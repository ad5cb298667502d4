//! Knitting operation
//!
//! Follows the carriage needle by needle, driving the solenoid under the
//! selecting cam from the current pattern line and requesting the next
//! line from the host once the carriage has run past the working range.

use heapless::Vec;

use crate::encoders::EncoderSnapshot;
use crate::fsm::{KnitJob, LineData};
use crate::machine::MAX_LINE_BUFFER_LEN;
use crate::needle;
use crate::traits::BeepEvent;

/// What one knit step asks the controller to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnitActions {
    /// Solenoid index and level
    pub solenoid: Option<(u8, bool)>,
    /// Send a status report
    pub report: bool,
    /// Request this line from the host
    pub request_line: Option<u8>,
    pub beep: Option<BeepEvent>,
    /// The last line is finished
    pub complete: bool,
}

/// Result of offering a pattern line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineOutcome {
    /// Line stored; it will be knitted on the next pass
    Accepted,
    /// Wrong line number; the requested line must be asked for again
    Mismatch { requested: u8 },
    /// No line is outstanding
    NotRequested,
}

/// Knit bookkeeping for one job
#[derive(Debug, Clone, Default)]
pub struct Knitter {
    job: Option<KnitJob>,
    line: Vec<u8, MAX_LINE_BUFFER_LEN>,
    current_line: u8,
    line_requested: bool,
    line_loaded: bool,
    last_line: bool,
    worked_on_line: bool,
    last_position: Option<u8>,
}

impl Knitter {
    pub const fn new() -> Self {
        Self {
            job: None,
            line: Vec::new(),
            current_line: 0,
            line_requested: false,
            line_loaded: false,
            last_line: false,
            worked_on_line: false,
            last_position: None,
        }
    }

    /// Start a job and ask for line 0
    pub fn begin(&mut self, job: KnitJob) -> KnitActions {
        *self = Self {
            job: Some(job),
            line_requested: true,
            ..Self::new()
        };

        KnitActions {
            request_line: Some(0),
            beep: Some(BeepEvent::Ready),
            ..KnitActions::default()
        }
    }

    /// Drop the current job
    pub fn stop(&mut self) {
        *self = Self::new();
    }

    pub fn is_active(&self) -> bool {
        self.job.is_some()
    }

    /// Line number the host still owes us
    pub fn requested_line(&self) -> Option<u8> {
        self.line_requested.then_some(self.current_line)
    }

    /// Check if the carriage is in the middle of knitting a line
    pub fn row_in_progress(&self) -> bool {
        self.worked_on_line
    }

    /// Offer a line from the host
    pub fn accept_line(&mut self, line: &LineData) -> LineOutcome {
        if !self.line_requested || self.job.is_none() {
            return LineOutcome::NotRequested;
        }
        if line.line_number != self.current_line {
            return LineOutcome::Mismatch {
                requested: self.current_line,
            };
        }

        self.line.clone_from(&line.pattern);
        self.last_line = line.last_line;
        self.line_requested = false;
        self.line_loaded = true;
        LineOutcome::Accepted
    }

    /// Process the carriage facts of one control cycle
    ///
    /// Does nothing unless the position changed since the previous call.
    pub fn step(&mut self, facts: &EncoderSnapshot) -> KnitActions {
        let mut actions = KnitActions::default();
        let Some(job) = self.job else {
            return actions;
        };
        if self.last_position == Some(facts.position) {
            return actions;
        }
        self.last_position = Some(facts.position);
        actions.report = job.continuous_reporting;

        let (Ok(machine), Ok(direction), Ok(carriage)) =
            (facts.machine_type(), facts.direction(), facts.carriage())
        else {
            return actions;
        };
        let geometry = machine.geometry();

        if let Ok(selection) = facts.selection() {
            let pixel = selection.pixel;
            if (job.start_needle..=job.stop_needle).contains(&pixel) && self.line_loaded {
                actions.solenoid = Some((selection.solenoid, self.pixel(pixel)));
                self.worked_on_line = true;
            } else {
                actions.solenoid = Some((selection.solenoid, true));
            }
        }

        // Unbounded: the cam runs past the last needle
        let pixel = needle::raw_pixel(machine, facts.position, direction, carriage);
        let past_left = pixel < i16::from(job.start_needle) - i16::from(geometry.end_of_line_offset_left);
        let past_right = pixel > i16::from(job.stop_needle) + i16::from(geometry.end_of_line_offset_right);

        if self.worked_on_line && (past_left || past_right) {
            self.worked_on_line = false;
            self.line_loaded = false;

            if self.last_line {
                self.job = None;
                actions.complete = true;
                actions.beep = Some(BeepEvent::EndOfWork);
            } else {
                self.current_line = self.current_line.wrapping_add(1);
                self.line_requested = true;
                actions.request_line = Some(self.current_line);
            }
        }

        actions
    }

    /// Pattern bit for `pixel`, LSB first within each byte
    fn pixel(&self, pixel: u8) -> bool {
        self.line
            .get(usize::from(pixel >> 3))
            .is_some_and(|byte| byte & (1 << (pixel & 0x07)) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::tests::Driver;
    use crate::machine::MachineType;

    fn job(start: u8, stop: u8) -> KnitJob {
        KnitJob {
            start_needle: start,
            stop_needle: stop,
            continuous_reporting: false,
            beeper: true,
        }
    }

    fn line(number: u8, fill: u8, last: bool) -> LineData {
        let mut pattern = Vec::new();
        pattern.resize(25, fill).unwrap();
        LineData {
            line_number: number,
            color: 0,
            last_line: last,
            pattern,
        }
    }

    /// Knit carriage anchored at the left sensor, moving right
    fn anchored() -> Driver {
        let mut d = Driver::new(MachineType::Kh910);
        d.pass_left_sensor();
        d
    }

    /// Step the carriage right, collecting every action
    fn run_right(d: &mut Driver, knitter: &mut Knitter, steps: usize) -> std::vec::Vec<KnitActions> {
        let mut out = std::vec::Vec::new();
        for _ in 0..steps {
            d.right(1).unwrap();
            out.push(knitter.step(&d.enc.peek()));
        }
        out
    }

    #[test]
    fn test_begin_requests_line_zero() {
        let mut knitter = Knitter::new();
        let actions = knitter.begin(job(0, 199));

        assert_eq!(actions.request_line, Some(0));
        assert_eq!(actions.beep, Some(BeepEvent::Ready));
        assert_eq!(knitter.requested_line(), Some(0));
        assert!(knitter.is_active());
    }

    #[test]
    fn test_accept_line() {
        let mut knitter = Knitter::new();
        assert_eq!(knitter.accept_line(&line(0, 0, false)), LineOutcome::NotRequested);

        knitter.begin(job(0, 199));
        assert_eq!(
            knitter.accept_line(&line(3, 0, false)),
            LineOutcome::Mismatch { requested: 0 }
        );
        assert_eq!(knitter.requested_line(), Some(0));

        assert_eq!(knitter.accept_line(&line(0, 0, false)), LineOutcome::Accepted);
        assert_eq!(knitter.requested_line(), None);

        // Duplicate confirmation
        assert_eq!(knitter.accept_line(&line(0, 0, false)), LineOutcome::NotRequested);
    }

    #[test]
    fn test_pixels_drive_solenoids() {
        let mut d = anchored();
        let mut knitter = Knitter::new();
        knitter.begin(job(0, 199));
        knitter.accept_line(&line(0, 0b0000_0010, false));

        // Position 28 + 12 = 40 is pixel 0
        run_right(&mut d, &mut knitter, 11);
        d.right(1).unwrap();
        let pixel0 = knitter.step(&d.enc.peek());
        assert_eq!(d.enc.position(), 40);
        assert_eq!(pixel0.solenoid, Some((40 % 16, false)));

        d.right(1).unwrap();
        let pixel1 = knitter.step(&d.enc.peek());
        assert_eq!(pixel1.solenoid, Some((41 % 16, true)));
        assert!(knitter.row_in_progress());
    }

    #[test]
    fn test_outside_range_energises() {
        let mut d = anchored();
        let mut knitter = Knitter::new();
        knitter.begin(job(50, 60));
        knitter.accept_line(&line(0, 0, false));

        run_right(&mut d, &mut knitter, 12);
        let actions = knitter.step(&d.enc.peek());
        // Unchanged position does nothing
        assert_eq!(actions, KnitActions::default());

        d.right(1).unwrap();
        let actions = knitter.step(&d.enc.peek());
        assert_eq!(actions.solenoid, Some((41 % 16, true)));
        assert!(!knitter.row_in_progress());
    }

    #[test]
    fn test_end_of_line_requests_next() {
        let mut d = anchored();
        let mut knitter = Knitter::new();
        knitter.begin(job(0, 20));
        knitter.accept_line(&line(0, 0xFF, false));

        // Pixel 0 at position 40; stop 20 + offset 12 passed at pixel 33
        let actions = run_right(&mut d, &mut knitter, 12 + 33);
        let requests: std::vec::Vec<_> = actions.iter().filter_map(|a| a.request_line).collect();
        assert_eq!(requests, [1]);
        assert_eq!(actions.last().unwrap().request_line, Some(1));
        assert_eq!(knitter.requested_line(), Some(1));

        // Further travel without a new line does not knit
        let more = run_right(&mut d, &mut knitter, 10);
        assert!(more
            .iter()
            .all(|a| a.request_line.is_none() && a.solenoid.is_some_and(|(_, on)| on)));
    }

    #[test]
    fn test_full_width_line_ends_past_the_bed() {
        let mut d = anchored();
        let mut knitter = Knitter::new();
        knitter.begin(job(0, 199));
        knitter.accept_line(&line(0, 0, true));

        // Pixel 212 sits at position 252
        let actions = run_right(&mut d, &mut knitter, 252 - 28);
        assert!(actions[..actions.len() - 1].iter().all(|a| !a.complete));
        assert!(actions.last().unwrap().complete);
    }

    #[test]
    fn test_last_line_completes() {
        let mut d = anchored();
        let mut knitter = Knitter::new();
        knitter.begin(job(0, 20));
        knitter.accept_line(&line(0, 0, true));

        let actions = run_right(&mut d, &mut knitter, 12 + 33);
        let last = actions.last().unwrap();
        assert!(last.complete);
        assert_eq!(last.beep, Some(BeepEvent::EndOfWork));
        assert_eq!(last.request_line, None);
        assert!(!knitter.is_active());
    }

    #[test]
    fn test_continuous_reporting() {
        let mut d = anchored();
        let mut knitter = Knitter::new();
        knitter.begin(KnitJob {
            continuous_reporting: true,
            ..job(0, 199)
        });

        let actions = run_right(&mut d, &mut knitter, 3);
        assert!(actions.iter().all(|a| a.report));
    }

    #[test]
    fn test_line_numbers_wrap() {
        let mut knitter = Knitter::new();
        knitter.begin(job(0, 100));
        knitter.current_line = 255;
        knitter.line_requested = false;
        knitter.line_loaded = true;
        knitter.worked_on_line = true;

        let mut d = anchored();
        d.right(200).unwrap();
        let actions = knitter.step(&d.enc.peek());
        assert_eq!(actions.request_line, Some(0));
    }
}
