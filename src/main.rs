use embassy_executor::Spawner;
use embassy_time::Instant;
use ember_rs::controller::{BoilerController, SnapshotChannel};
use ember_rs::hardware::buttons::GpioButton;
use ember_rs::hardware::display::{create_display_controller, DisplayController};
use ember_rs::hardware::heater::PwmHeater;
use ember_rs::hardware::thermocouple::Max6675;
use ember_rs::storage::NvsConfigStore;
use esp_idf_svc::hal::gpio::IOPin;
use esp_idf_svc::hal::i2c::I2cDriver;
use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::spi::{config::Config as SpiConfig, SpiDeviceDriver, SpiDriverConfig};
use log::{error, info, warn};
use std::sync::Arc;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Starting Ember boiler controller");

    if let Err(e) = bring_up(spawner).await {
        error!("bring-up failed: {:?}", e);
    }
}

async fn bring_up(spawner: Spawner) -> anyhow::Result<()> {
    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // MAX6675 thermocouple on SPI2. The converter is read-only; SDO is
    // claimed because the bus driver wants a full pin set.
    let spi = SpiDeviceDriver::new_single(
        peripherals.spi2,
        pins.gpio18,
        pins.gpio23,
        Some(pins.gpio19),
        Some(pins.gpio5),
        &SpiDriverConfig::new(),
        &SpiConfig::new().baudrate(1.MHz().into()),
    )?;
    let sensor = Max6675::new(spi);

    // heating element SSR behind LEDC PWM
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new().frequency(1.kHz().into()),
    )?;
    let pwm = LedcDriver::new(peripherals.ledc.channel0, timer, pins.gpio13)?;
    let heater = PwmHeater::new(pwm)?;

    // front panel buttons and the steam switch, all pulled up
    let key_button = GpioButton::new(pins.gpio14.downgrade())?;
    let aux_button = GpioButton::new(pins.gpio0.downgrade())?;
    let steam_switch = GpioButton::new(pins.gpio4.downgrade())?;

    let store = NvsConfigStore::new();
    let snapshots = Arc::new(SnapshotChannel::new());

    // the display is optional; a dead OLED must not stop the boiler
    match create_display_controller(pins.gpio21, pins.gpio22) {
        Ok(mut display) => {
            if let Err(e) = display.show_boot_screen() {
                warn!("boot screen failed: {:?}", e);
            }
            if spawner
                .spawn(display_task(display, Arc::clone(&snapshots)))
                .is_err()
            {
                warn!("failed to spawn display task - continuing headless");
            }
        }
        Err(e) => warn!("display unavailable ({:?}) - continuing headless", e),
    }

    let mut controller = BoilerController::new(
        sensor,
        heater,
        store,
        key_button,
        aux_button,
        steam_switch,
        Arc::clone(&snapshots),
        Instant::now(),
    );
    controller.run().await
}

#[embassy_executor::task]
async fn display_task(
    mut display: DisplayController<I2cDriver<'static>>,
    snapshots: Arc<SnapshotChannel>,
) {
    info!("display task started");
    loop {
        let snapshot = snapshots.receive().await;
        if let Err(e) = display.render(&snapshot) {
            warn!("display render failed: {:?}", e);
        }
    }
}
