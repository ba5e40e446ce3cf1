//! Flash persistence adapter.
//!
//! The firmware keeps exactly two blobs across reboots, each in its own
//! NVS namespace:
//!
//! | Namespace  | Key      | Contents                        | Port          |
//! |------------|----------|---------------------------------|---------------|
//! | `autocomp` | `syscfg` | postcard [`SystemConfig`]       | `ConfigPort`  |
//! | `sensor`   | `calib`  | postcard `SensorCalibration`    | `StoragePort` |
//!
//! The config is validated on save and again on load, so a blob written
//! by an older build with looser ranges is refused rather than run.
//! Any other namespace is refused.
//!
//! On the device each namespace is an `EspNvs` handle on the default
//! partition; NVS commits are atomic per blob.  On the host each namespace
//! is an in-memory map, which is what the tests run against.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;
use crate::sensors::calibration::CALIBRATION_NAMESPACE;

const CONFIG_NAMESPACE: &str = "autocomp";
const CONFIG_KEY: &str = "syscfg";

/// Read buffer for the config blob; saves larger than this are refused so
/// that whatever is stored can always be read back.
const MAX_CONFIG_BLOB: usize = 512;

// ───────────────────────────────────────────────────────────────
// Shelf: one open namespace
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod shelf {
    use core::cell::RefCell;

    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
    use log::warn;

    use crate::app::ports::StorageError;

    pub struct Shelf {
        nvs: RefCell<EspNvs<NvsDefault>>,
    }

    impl Shelf {
        pub fn open(partition: &EspDefaultNvsPartition, namespace: &str) -> Option<Self> {
            match EspNvs::new(partition.clone(), namespace, true) {
                Ok(nvs) => Some(Self {
                    nvs: RefCell::new(nvs),
                }),
                Err(e) => {
                    warn!("NVS namespace '{}' could not be opened: {}", namespace, e);
                    None
                }
            }
        }

        /// `Ok(None)` when the key has never been written.
        pub fn get(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
            self.nvs
                .borrow()
                .get_blob(key, buf)
                .map(|blob| blob.map(<[u8]>::len))
                .map_err(|e| {
                    warn!("NVS read of '{}' failed: {}", key, e);
                    StorageError::IoError
                })
        }

        pub fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
            self.nvs.borrow_mut().set_blob(key, data).map_err(|e| {
                warn!("NVS write of '{}' failed: {}", key, e);
                StorageError::IoError
            })
        }

        pub fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.nvs
                .borrow_mut()
                .remove(key)
                .map(|_| ())
                .map_err(|_| StorageError::IoError)
        }

        pub fn contains(&self, key: &str) -> bool {
            self.nvs.borrow().contains(key).unwrap_or(false)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod shelf {
    use core::cell::RefCell;
    use std::collections::BTreeMap;

    use crate::app::ports::StorageError;

    #[derive(Default)]
    pub struct Shelf {
        blobs: RefCell<BTreeMap<String, Vec<u8>>>,
    }

    impl Shelf {
        /// Like NVS, a buffer shorter than the stored blob is an error.
        pub fn get(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
            let blobs = self.blobs.borrow();
            let Some(blob) = blobs.get(key) else {
                return Ok(None);
            };
            let dst = buf.get_mut(..blob.len()).ok_or(StorageError::IoError)?;
            dst.copy_from_slice(blob);
            Ok(Some(blob.len()))
        }

        pub fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
            self.blobs.borrow_mut().insert(key.to_owned(), data.to_vec());
            Ok(())
        }

        pub fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.blobs.borrow_mut().remove(key);
            Ok(())
        }

        pub fn contains(&self, key: &str) -> bool {
            self.blobs.borrow().contains_key(key)
        }
    }
}

use shelf::Shelf;

struct Shelves {
    config: Shelf,
    sensor: Shelf,
}

// ───────────────────────────────────────────────────────────────
// NvsAdapter
// ───────────────────────────────────────────────────────────────

/// Persists the system config and the sensor calibration.
///
/// A detached adapter (no usable partition) fails every operation with an
/// I/O error, so the caller runs on defaults without persistence.
pub struct NvsAdapter {
    shelves: Option<Shelves>,
}

impl NvsAdapter {
    /// Take the default NVS partition and open both namespaces.
    ///
    /// Taking the partition initialises flash, erasing it first when it is
    /// full or was written by a newer NVS format.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, ConfigError> {
        use esp_idf_svc::nvs::EspDefaultNvsPartition;

        let partition = EspDefaultNvsPartition::take().map_err(|e| {
            warn!("NVS partition unavailable: {}", e);
            ConfigError::IoError
        })?;
        let config = Shelf::open(&partition, CONFIG_NAMESPACE).ok_or(ConfigError::IoError)?;
        let sensor = Shelf::open(&partition, CALIBRATION_NAMESPACE).ok_or(ConfigError::IoError)?;
        info!(
            "NvsAdapter: namespaces '{}' and '{}' open",
            CONFIG_NAMESPACE, CALIBRATION_NAMESPACE
        );
        Ok(Self {
            shelves: Some(Shelves { config, sensor }),
        })
    }

    /// In-memory store for host builds.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsAdapter: in-memory backend");
        Ok(Self {
            shelves: Some(Shelves {
                config: Shelf::default(),
                sensor: Shelf::default(),
            }),
        })
    }

    /// An adapter with no backing store.
    pub fn detached() -> Self {
        warn!("NvsAdapter: running without persistence");
        Self { shelves: None }
    }

    pub fn is_attached(&self) -> bool {
        self.shelves.is_some()
    }

    fn shelf(&self, namespace: &str) -> Result<&Shelf, StorageError> {
        let shelves = self.shelves.as_ref().ok_or(StorageError::IoError)?;
        match namespace {
            CONFIG_NAMESPACE => Ok(&shelves.config),
            CALIBRATION_NAMESPACE => Ok(&shelves.sensor),
            other => {
                warn!("NvsAdapter: no namespace '{}'", other);
                Err(StorageError::IoError)
            }
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let shelf = self.shelf(CONFIG_NAMESPACE).map_err(|_| ConfigError::IoError)?;
        let mut buf = [0u8; MAX_CONFIG_BLOB];
        let Some(len) = shelf
            .get(CONFIG_KEY, &mut buf)
            .map_err(|_| ConfigError::IoError)?
        else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };

        let cfg: SystemConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_CONFIG_BLOB {
            return Err(ConfigError::IoError);
        }
        self.shelf(CONFIG_NAMESPACE)
            .and_then(|shelf| shelf.put(CONFIG_KEY, &bytes))
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.shelf(namespace)?
            .get(key, buf)?
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.shelf(namespace)?.put(key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.shelf(namespace)?.remove(key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.shelf(namespace).is_ok_and(|shelf| shelf.contains(key))
    }
}
