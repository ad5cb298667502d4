//! Host UART receive task
//!
//! Decodes SLIP frames from the host and queues them for the control task.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use ayab_protocol::FrameDecoder;

use crate::channels::{count, FRAMES_DROPPED, FRAME_CHANNEL};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Host RX task - receives and unframes host packets
#[embassy_executor::task]
pub async fn host_rx_task(mut rx: BufferedUartRx) {
    info!("Host RX task started");

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        let n = match rx.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("UART read error: {:?}", e);
                decoder.reset();
                continue;
            }
        };
        trace!("RX: {} bytes", n);

        for result in decoder.decode(&buf[..n]) {
            match result {
                Ok(frame) => {
                    if FRAME_CHANNEL.try_send(frame).is_err() {
                        let dropped = count(&FRAMES_DROPPED);
                        warn!("Frame channel full, {} frames dropped", dropped);
                    }
                }
                Err(e) => {
                    let dropped = count(&FRAMES_DROPPED);
                    warn!("Frame discarded: {:?} ({} total)", e, dropped);
                }
            }
        }
    }
}
