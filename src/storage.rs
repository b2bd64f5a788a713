//! NVS persistence for the boiler configuration. The record is stored as a
//! JSON blob in the default NVS partition; when NVS is unavailable the store
//! degrades to in-memory so the controller keeps running with volatile
//! settings.

use crate::traits::{ConfigStore, StorageError};
use crate::types::BoilerConfig;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::EspError;
use log::{debug, info, warn};

const NVS_NAMESPACE: &str = "ember";
const CONFIG_KEY: &str = "config";

/// In-memory stand-in with the same contract; also what the NVS store falls
/// back on when the flash backend cannot be brought up.
pub struct MemoryConfigStore {
    record: Option<BoilerConfig>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self { record: None }
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&mut self) -> Result<BoilerConfig, StorageError> {
        self.record.clone().ok_or(StorageError::Missing)
    }

    fn save(&mut self, config: &BoilerConfig) -> Result<(), StorageError> {
        self.record = Some(config.clone());
        Ok(())
    }
}

pub struct NvsConfigStore {
    nvs: Option<EspNvs<NvsDefault>>,
    fallback: MemoryConfigStore,
}

impl NvsConfigStore {
    pub fn new() -> Self {
        let nvs = match Self::init_nvs() {
            Ok(nvs) => {
                info!("NVS config store ready (namespace '{}')", NVS_NAMESPACE);
                Some(nvs)
            }
            Err(e) => {
                warn!("NVS unavailable ({}), settings will not survive reboot", e);
                None
            }
        };
        Self {
            nvs,
            fallback: MemoryConfigStore::new(),
        }
    }

    fn init_nvs() -> Result<EspNvs<NvsDefault>, EspError> {
        let partition = EspDefaultNvsPartition::take()?;
        EspNvs::new(partition, NVS_NAMESPACE, true)
    }
}

impl Default for NvsConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for NvsConfigStore {
    fn load(&mut self) -> Result<BoilerConfig, StorageError> {
        let Some(nvs) = self.nvs.as_ref() else {
            return self.fallback.load();
        };
        let mut buf = [0u8; 256];
        match nvs.get_blob(CONFIG_KEY, &mut buf) {
            Ok(Some(data)) => {
                let config =
                    serde_json::from_slice::<BoilerConfig>(data).map_err(|_| StorageError::Corrupt)?;
                debug!("loaded config from NVS: {:?}", config);
                Ok(config)
            }
            Ok(None) => Err(StorageError::Missing),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    fn save(&mut self, config: &BoilerConfig) -> Result<(), StorageError> {
        let Some(nvs) = self.nvs.as_mut() else {
            return self.fallback.save(config);
        };
        let data = serde_json::to_vec(config).map_err(|e| StorageError::Backend(e.to_string()))?;
        nvs.set_blob(CONFIG_KEY, &data)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        debug!(
            "saved config: brew={:.1} steam={:.1} kp={} ki={} kd={}",
            config.brew_temp, config.steam_temp, config.kp, config.ki, config.kd
        );
        Ok(())
    }
}
