use crate::types::{BoilerConfig, OperatingMode};

/// Derive the operating mode and its setpoint from the steam switch.
/// The switch is wired with a pull-up, so closed reads as pressed. No
/// hysteresis: a flip takes effect on the very next tick.
pub fn resolve(steam_switch_closed: bool, config: &BoilerConfig) -> (OperatingMode, f32) {
    if steam_switch_closed {
        (OperatingMode::Steam, config.steam_temp)
    } else {
        (OperatingMode::Brew, config.brew_temp)
    }
}
