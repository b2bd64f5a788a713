//! Narrow interfaces to the hardware collaborators. The control core only
//! ever talks to these traits; the esp-idf implementations live in
//! `hardware/` and tests substitute mocks.

use crate::types::BoilerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// Thermocouple reports an open circuit (probe unplugged or broken).
    OpenCircuit,
    /// The bus transfer itself failed.
    Bus(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::OpenCircuit => write!(f, "thermocouple open circuit"),
            SensorError::Bus(msg) => write!(f, "sensor bus error: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}

#[derive(Debug, Clone)]
pub enum HeaterError {
    Pwm(String),
}

impl std::fmt::Display for HeaterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaterError::Pwm(msg) => write!(f, "PWM error: {}", msg),
        }
    }
}

impl std::error::Error for HeaterError {}

#[derive(Debug, Clone)]
pub enum StorageError {
    /// No record stored yet (first boot).
    Missing,
    /// A record exists but does not decode.
    Corrupt,
    Backend(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Missing => write!(f, "no stored configuration"),
            StorageError::Corrupt => write!(f, "stored configuration is corrupt"),
            StorageError::Backend(msg) => write!(f, "storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Calibrated boiler temperature in Celsius, read on demand.
pub trait TemperatureSensor {
    fn read(&mut self) -> Result<f32, SensorError>;
}

/// Heating element actuator; duty 0..255 maps linearly to heater power.
pub trait HeaterOutput {
    fn set_duty(&mut self, duty: u8) -> Result<(), HeaterError>;
}

/// A momentary input line (button or the steam switch), sampled at poll time.
/// Gesture timing is derived by the control loop, not by the input source.
pub trait ButtonInput {
    fn is_pressed(&mut self) -> bool;
}

/// Durable store for the configuration record.
pub trait ConfigStore {
    fn load(&mut self) -> Result<BoilerConfig, StorageError>;
    fn save(&mut self, config: &BoilerConfig) -> Result<(), StorageError>;
}
