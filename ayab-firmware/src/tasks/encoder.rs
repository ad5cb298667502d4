//! Encoder sampling task
//!
//! Wakes on every ENC_A edge, reads the belt phase and both end-of-line
//! hall sensors and hands the sample to the control task. While the
//! carriage rests, a sample is still taken every `IDLE_SAMPLE_MS` so the
//! test mode reads live sensor values.

use defmt::*;
use embassy_futures::select::select;
use embassy_rp::adc::{Adc, Async, Channel};
use embassy_rp::gpio::Input;
use embassy_time::{Instant, Timer};

use ayab_core::encoders::EncoderSample;

use crate::channels::{count, SAMPLES_DROPPED, SAMPLE_CHANNEL};

/// Sampling period with no encoder activity
const IDLE_SAMPLE_MS: u64 = 50;

/// The hall thresholds are 10-bit values; the RP2040 ADC is 12-bit
const ADC_SHIFT: u16 = 2;

/// Encoder and hall sensor inputs
pub struct EncoderInputs {
    pub enc_a: Input<'static>,
    pub enc_b: Input<'static>,
    pub enc_c: Input<'static>,
    pub adc: Adc<'static, Async>,
    pub hall_left: Channel<'static>,
    pub hall_right: Channel<'static>,
}

/// Encoder task - samples the carriage sensors
#[embassy_executor::task]
pub async fn encoder_task(mut inputs: EncoderInputs) {
    info!("Encoder task started");

    let mut hall = [0u16; 2];

    loop {
        select(
            inputs.enc_a.wait_for_any_edge(),
            Timer::after_millis(IDLE_SAMPLE_MS),
        )
        .await;

        hall[0] = read_hall(&mut inputs.adc, &mut inputs.hall_left, hall[0]).await;
        hall[1] = read_hall(&mut inputs.adc, &mut inputs.hall_right, hall[1]).await;

        let sample = EncoderSample {
            enc_a: inputs.enc_a.is_high(),
            enc_b: inputs.enc_b.is_high(),
            enc_c: inputs.enc_c.is_high(),
            hall_left: hall[0],
            hall_right: hall[1],
            timestamp_ms: Instant::now().as_millis() as u32,
        };

        if SAMPLE_CHANNEL.try_send(sample).is_err() {
            let dropped = count(&SAMPLES_DROPPED);
            warn!("Sample channel full, {} samples dropped", dropped);
        }
    }
}

/// Read one hall sensor scaled to 10 bits, keeping `last` on failure
async fn read_hall(adc: &mut Adc<'static, Async>, channel: &mut Channel<'static>, last: u16) -> u16 {
    match adc.read(channel).await {
        Ok(raw) => raw >> ADC_SHIFT,
        Err(e) => {
            warn!("Hall ADC read failed: {:?}", e);
            last
        }
    }
}
