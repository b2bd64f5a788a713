use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Brew,
    Steam,
}

impl OperatingMode {
    pub fn label(&self) -> &'static str {
        match self {
            OperatingMode::Brew => "BREW",
            OperatingMode::Steam => "STEAM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuScreen {
    Off,
    EditBrewTemp,
    EditSteamTemp,
    Tune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningStatus {
    Inactive,
    Active,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoilerConfig {
    pub brew_temp: f32,
    pub steam_temp: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for BoilerConfig {
    fn default() -> Self {
        Self {
            brew_temp: 60.0,
            steam_temp: 120.0,
            kp: 15.0,
            ki: 0.006,
            kd: 20.0,
        }
    }
}

impl BoilerConfig {
    /// A persisted record is usable only if every field is finite; NVS hands
    /// back garbage on first boot or after a partial write.
    pub fn is_valid(&self) -> bool {
        [self.brew_temp, self.steam_temp, self.kp, self.ki, self.kd]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Read-only per-tick state handed to the display renderer.
#[derive(Debug, Clone)]
pub struct ControlSnapshot {
    pub mode: OperatingMode,
    pub setpoint: f32,
    pub measured: f32,
    pub duty: u8,
    pub config: BoilerConfig,
    pub screen: MenuScreen,
    pub tuning: TuningStatus,
    pub trend: [f32; HISTORY_LEN],
}

pub const HISTORY_LEN: usize = 8;
pub const SAMPLE_TIME_MS: u64 = 1500;
pub const MENU_TICK_MS: u64 = 100;
pub const LONG_PRESS_MS: u64 = 2000;
pub const BREW_DECREMENT_LIMIT_MS: u64 = 3000; // inherited quirk, see menu.rs
pub const MENU_TIMEOUT_MS: u64 = 5000;
pub const SETPOINT_STEP_C: f32 = 1.0;
