//! Host UART transmit task

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use ayab_protocol::DeviceMessage;

use crate::channels::OUTGOING;

/// Host TX task - frames and sends device messages in order
#[embassy_executor::task]
pub async fn host_tx_task(mut tx: BufferedUartTx) {
    info!("Host TX task started");

    loop {
        let message = OUTGOING.receive().await;
        send(&mut tx, &message).await;
    }
}

async fn send(tx: &mut BufferedUartTx, message: &DeviceMessage) {
    let encoded = match message.to_packet().and_then(|packet| packet.encode_to_vec()) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("Failed to encode {:?}: {:?}", message.id(), e);
            return;
        }
    };

    if let Err(e) = tx.write_all(&encoded).await {
        warn!("Failed to send {:?}: {:?}", message.id(), e);
    } else {
        trace!("TX: {:?}", message.id());
    }
}
