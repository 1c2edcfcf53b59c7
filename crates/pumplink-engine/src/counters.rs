//! Persisted sale counters.
//!
//! The engine loads counters once at startup and saves them once per
//! completed sale. Storage is behind [`CounterStore`]; a JSON file store
//! keeps the on-disk layout used by existing installations:
//!
//! ```json
//! {"vechs": 12, "total_l": 345.67}
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CounterStoreError {
    #[error("counter file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("counter file {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistentCounters {
    #[serde(rename = "vechs", default)]
    pub vehicle_count: u64,
    #[serde(rename = "total_l", default)]
    pub total_liters: f64,
}

impl PersistentCounters {
    /// Account one completed sale.
    pub fn bump(&mut self, liters: f64) {
        self.vehicle_count += 1;
        self.total_liters += liters;
    }
}

/// Storage collaborator for [`PersistentCounters`].
pub trait CounterStore {
    fn load(&mut self) -> Result<PersistentCounters, CounterStoreError>;
    fn save(&mut self, counters: &PersistentCounters) -> Result<(), CounterStoreError>;
}

/// Volatile store, for tests and sessions without a counter file.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    counters: PersistentCounters,
    saves: usize,
}

impl MemoryCounterStore {
    pub fn new(counters: PersistentCounters) -> Self {
        Self { counters, saves: 0 }
    }

    pub fn counters(&self) -> PersistentCounters {
        self.counters
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl CounterStore for MemoryCounterStore {
    fn load(&mut self) -> Result<PersistentCounters, CounterStoreError> {
        Ok(self.counters)
    }

    fn save(&mut self, counters: &PersistentCounters) -> Result<(), CounterStoreError> {
        self.counters = *counters;
        self.saves += 1;
        Ok(())
    }
}

/// JSON file store, written atomically through a sibling temp file.
#[derive(Debug, Clone)]
pub struct JsonFileCounterStore {
    path: PathBuf,
}

impl JsonFileCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> CounterStoreError {
        CounterStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CounterStore for JsonFileCounterStore {
    /// A missing file reads as zeroed counters.
    fn load(&mut self) -> Result<PersistentCounters, CounterStoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(PersistentCounters::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&text).map_err(|source| CounterStoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, counters: &PersistentCounters) -> Result<(), CounterStoreError> {
        let json = serde_json::to_string(counters).map_err(|source| CounterStoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|err| self.io_error(err))?;
        fs::rename(&temp, &self.path).map_err(|err| self.io_error(err))
    }
}
