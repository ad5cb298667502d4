//! AYAB - Knitting Machine Controller Firmware
//!
//! Firmware binary for RP2040-based AYAB boards. Reads the carriage
//! encoders, selects needles through the solenoid bank and exchanges
//! pattern lines with the host over a SLIP-framed serial link.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, InterruptHandler as AdcInterruptHandler};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{Config as I2cConfig, I2c};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use portable_atomic::Ordering;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ayab_core::FIRMWARE_VERSION;
use ayab_drivers::{GpioBeeper, Mcp23008Solenoids};
use ayab_protocol::API_VERSION;

use crate::channels::{FRAMES_DROPPED, SAMPLES_DROPPED};
use crate::config::FIRMWARE_CONFIG;

mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    ADC_IRQ_FIFO => AdcInterruptHandler;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let [major, minor, patch] = FIRMWARE_VERSION;
    info!("AYAB firmware v{}.{}.{} (API v{}) starting...", major, minor, patch, API_VERSION);

    let p = embassy_rp::init(Default::default());
    let config = FIRMWARE_CONFIG;
    info!("Configuration: {:?}", config);

    // Host link on UART0 (GPIO0 TX, GPIO1 RX)
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.baud_rate;

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART initialized at {} baud", config.baud_rate);

    // Carriage sensors: ENC_A, ENC_B, ENC_C on GPIO2/3/6, EOL halls on ADC0/1
    let inputs = tasks::EncoderInputs {
        enc_a: Input::new(p.PIN_2, Pull::Up),
        enc_b: Input::new(p.PIN_3, Pull::Up),
        enc_c: Input::new(p.PIN_6, Pull::Up),
        adc: Adc::new(p.ADC, Irqs, embassy_rp::adc::Config::default()),
        hall_left: Channel::new_pin(p.PIN_26, Pull::None),
        hall_right: Channel::new_pin(p.PIN_27, Pull::None),
    };

    info!("Encoder inputs initialized");

    // Solenoid expanders on I2C0 (GPIO8 SDA, GPIO9 SCL)
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_9, p.PIN_8, I2cConfig::default());
    let mut solenoids = Mcp23008Solenoids::new(i2c, config.solenoid_addresses);
    match solenoids.init() {
        Ok(()) => info!("Solenoid expanders initialized"),
        Err(e) => error!("Solenoid expander init failed: {:?}", e),
    }

    let beeper = GpioBeeper::new(Output::new(p.PIN_7, Level::Low));

    // Spawn tasks
    spawner.spawn(tasks::encoder_task(inputs)).unwrap();
    spawner.spawn(tasks::host_rx_task(rx)).unwrap();
    spawner.spawn(tasks::host_tx_task(tx)).unwrap();
    spawner
        .spawn(tasks::control_task(config, solenoids, beeper))
        .unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        debug!(
            "Dropped: {} samples, {} frames",
            SAMPLES_DROPPED.load(Ordering::Relaxed),
            FRAMES_DROPPED.load(Ordering::Relaxed)
        );
    }
}
