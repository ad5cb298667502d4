//! Control loop task
//!
//! Owns the controller. Every control period it drains encoder samples,
//! runs host frames through the protocol state machine, updates the
//! operations and forwards the outbox to the TX task.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::i2c::{Blocking, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_time::{Duration, Instant, Ticker};

use ayab_core::config::FirmwareConfig;
use ayab_core::state::OperatingState;
use ayab_core::Controller;
use ayab_drivers::{GpioBeeper, Mcp23008Solenoids};
use ayab_protocol::{ErrorCode, Severity};

use crate::channels::{FRAME_CHANNEL, OUTGOING, SAMPLE_CHANNEL};

pub type Solenoids = Mcp23008Solenoids<I2c<'static, I2C0, Blocking>>;
pub type Buzzer = GpioBeeper<Output<'static>>;

/// Control task - main coordination loop
#[embassy_executor::task]
pub async fn control_task(config: FirmwareConfig, solenoids: Solenoids, beeper: Buzzer) {
    info!("Control task started");

    let mut controller = Controller::new(config, solenoids, beeper);
    let mut ticker = Ticker::every(Duration::from_millis(config.control_period_ms.into()));
    let mut state = controller.state();
    let mut dropped = 0;

    loop {
        ticker.next().await;

        while let Ok(sample) = SAMPLE_CHANNEL.try_receive() {
            if let Err(code) = controller.on_sample(&sample) {
                debug!("Encoder: {:?} at position {}", code, controller.facts().position);
            }
        }

        while let Ok(frame) = FRAME_CHANNEL.try_receive() {
            let code = controller.on_frame(&frame);
            log_result(code);
            state = log_transition(state, controller.state());
        }

        let now_ms = Instant::now().as_millis() as u32;
        if let Err(e) = controller.update(now_ms) {
            error!("Solenoid write failed: {:?}", e);
        }
        state = log_transition(state, controller.state());

        // Messages wait in the outbox while the TX channel is full
        while OUTGOING.free_capacity() > 0 {
            let Some(message) = controller.poll_outgoing() else {
                break;
            };
            let _ = OUTGOING.try_send(message);
        }

        if controller.dropped_messages() != dropped {
            dropped = controller.dropped_messages();
            warn!("Outbox full, {} messages dropped", dropped);
        }
    }
}

fn log_result(code: ErrorCode) {
    if code.is_success() {
        trace!("Command accepted");
    } else if code.is_fatal() {
        error!("Command failed: {:?}", code);
    } else if code.severity() == Some(Severity::Warning) {
        warn!("Command rejected: {:?}", code);
    } else {
        warn!("Command refused, falling back: {:?}", code);
    }
}

fn log_transition(from: OperatingState, to: OperatingState) -> OperatingState {
    if from != to {
        info!("State: {:?} -> {:?}", from, to);
    }
    to
}
