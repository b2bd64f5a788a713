use crate::traits::{SensorError, TemperatureSensor};
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver};
use log::debug;

/// MAX6675 K-type thermocouple converter. Read-only SPI device: clocking out
/// 16 bits yields the conversion, bit 2 flags an open thermocouple, bits
/// 14..3 are the temperature in 0.25 °C steps.
pub struct Max6675<'d> {
    spi: SpiDeviceDriver<'d, SpiDriver<'d>>,
}

impl<'d> Max6675<'d> {
    pub fn new(spi: SpiDeviceDriver<'d, SpiDriver<'d>>) -> Self {
        Self { spi }
    }
}

impl TemperatureSensor for Max6675<'_> {
    fn read(&mut self) -> Result<f32, SensorError> {
        let mut frame = [0u8; 2];
        self.spi
            .read(&mut frame)
            .map_err(|e| SensorError::Bus(e.to_string()))?;
        let raw = u16::from_be_bytes(frame);

        if raw & 0x0004 != 0 {
            return Err(SensorError::OpenCircuit);
        }

        let temperature = ((raw >> 3) & 0x0fff) as f32 * 0.25;
        debug!("thermocouple: {:.2} °C (raw {:#06x})", temperature, raw);
        Ok(temperature)
    }
}
