use log::{info, warn};

/// Hard fail-safe applied after the regulator, independent of its own
/// clamping: no heating on a faulted sensor and no heating at or above the
/// setpoint. Engage/release transitions are logged once, not per tick.
pub struct SafetyGate {
    engaged: bool,
}

impl SafetyGate {
    pub fn new() -> Self {
        Self { engaged: false }
    }

    pub fn apply(&mut self, measured: f32, setpoint: f32, duty: u8) -> u8 {
        let sensor_fault = !measured.is_finite() || measured <= 0.0;
        let at_or_above_setpoint = measured >= setpoint;

        if sensor_fault || at_or_above_setpoint {
            if !self.engaged {
                self.engaged = true;
                if sensor_fault {
                    warn!("SAFETY: sensor fault ({}), heater forced off", measured);
                } else {
                    info!(
                        "SAFETY: {:.1} °C at/above setpoint {:.1} °C, heater off",
                        measured, setpoint
                    );
                }
            }
            return 0;
        }

        if self.engaged {
            self.engaged = false;
            info!("SAFETY: released, regulator back in control");
        }
        duty
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}
