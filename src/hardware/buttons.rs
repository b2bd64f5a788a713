use crate::traits::ButtonInput;
use esp_idf_svc::hal::gpio::{AnyIOPin, Input, PinDriver, Pull};
use esp_idf_svc::sys::EspError;

/// Momentary input on a GPIO with the internal pull-up enabled; pressed
/// (or, for the steam switch, closed) reads LOW.
pub struct GpioButton<'d> {
    pin: PinDriver<'d, AnyIOPin, Input>,
}

impl<'d> GpioButton<'d> {
    pub fn new(pin: AnyIOPin) -> Result<Self, EspError> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        Ok(Self { pin })
    }
}

impl ButtonInput for GpioButton<'_> {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}
