use crate::traits::{HeaterError, HeaterOutput};
use esp_idf_svc::hal::ledc::LedcDriver;
use log::{debug, info};

/// Heating element behind an SSR, driven by LEDC PWM. The 0..255 duty
/// command is rescaled onto the timer's native duty range.
pub struct PwmHeater<'d> {
    pwm: LedcDriver<'d>,
    max_duty: u32,
    last_duty: Option<u8>,
}

impl<'d> PwmHeater<'d> {
    pub fn new(mut pwm: LedcDriver<'d>) -> Result<Self, HeaterError> {
        let max_duty = pwm.get_max_duty();
        // heater off until the control loop says otherwise
        pwm.set_duty(0).map_err(|e| HeaterError::Pwm(e.to_string()))?;
        info!("heater PWM ready (max duty {})", max_duty);
        Ok(Self {
            pwm,
            max_duty,
            last_duty: None,
        })
    }
}

impl HeaterOutput for PwmHeater<'_> {
    fn set_duty(&mut self, duty: u8) -> Result<(), HeaterError> {
        if self.last_duty == Some(duty) {
            return Ok(());
        }
        let scaled = self.max_duty * u32::from(duty) / 255;
        self.pwm
            .set_duty(scaled)
            .map_err(|e| HeaterError::Pwm(e.to_string()))?;
        self.last_duty = Some(duty);
        debug!("heater duty {}/255 ({}/{})", duty, scaled, self.max_duty);
        Ok(())
    }
}
