//! Dashboard preferences persistence
//!
//! Preferences are a plain value passed to whoever renders the dashboard.
//! Loading and saving go through the [`KeyValueStore`] port; the CLI uses
//! [`JsonFileStore`] in its cache directory, tests use
//! [`MemoryKeyValueStore`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::analytics::PeriodSelection;
use crate::error::CoreError;
use crate::models::{SellerId, TrackedMetricSet};

/// Key under which preferences are stored
pub const PREFERENCES_KEY: &str = "dashboard-preferences";

/// Minimal string key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file (`<dir>/kpiboard-store.json`)
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("kpiboard-store.json"),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(CoreError::FileRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| CoreError::JsonParse {
            path: self.path.clone(),
            message: source.to_string(),
            source,
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), CoreError> {
        let write_err = |source: std::io::Error| CoreError::FileWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(entries).map_err(|e| CoreError::Preferences {
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, content).map_err(write_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let _guard = self.lock.lock();
        // A corrupt file is replaced rather than blocking every save
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all().unwrap_or_default();
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Dashboard block, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSection {
    Kpis,
    Evolution,
    Objectives,
    Challenges,
    Debriefs,
    Team,
}

impl DashboardSection {
    pub const DEFAULT_ORDER: [DashboardSection; 6] = [
        Self::Kpis,
        Self::Evolution,
        Self::Objectives,
        Self::Challenges,
        Self::Debriefs,
        Self::Team,
    ];
}

/// UI preferences for the KPI dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardPreferences {
    /// Last selected period
    pub period: PeriodSelection,
    pub section_order: Vec<DashboardSection>,
    /// Manager view: restrict charts to one seller
    pub seller_filter: Option<SellerId>,
    /// Metrics shown as chart series
    pub tracked: TrackedMetricSet,
}

impl Default for DashboardPreferences {
    fn default() -> Self {
        Self {
            period: PeriodSelection::default(),
            section_order: DashboardSection::DEFAULT_ORDER.to_vec(),
            seller_filter: None,
            tracked: TrackedMetricSet::all(),
        }
    }
}

impl DashboardPreferences {
    /// Load preferences; returns defaults on any store or parse error
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match store.get(PREFERENCES_KEY) {
            Ok(Some(content)) => match serde_json::from_str::<Self>(&content) {
                Ok(prefs) => prefs.normalized(),
                Err(e) => {
                    tracing::warn!("Invalid dashboard preferences, using defaults: {}", e);
                    Self::default()
                }
            },
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read dashboard preferences: {}", e);
                Self::default()
            }
        }
    }

    /// Persist preferences
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), CoreError> {
        let content = serde_json::to_string(self).map_err(|e| CoreError::Preferences {
            message: e.to_string(),
        })?;
        store.set(PREFERENCES_KEY, &content)
    }

    /// Drop stored preferences
    pub fn reset(store: &dyn KeyValueStore) -> Result<(), CoreError> {
        store.remove(PREFERENCES_KEY)
    }

    /// Move `section` to `index` (clamped), keeping the others in order
    pub fn move_section(&mut self, section: DashboardSection, index: usize) {
        self.section_order.retain(|s| *s != section);
        let index = index.min(self.section_order.len());
        self.section_order.insert(index, section);
    }

    /// Dedupe sections and append any missing ones (older stored orders)
    fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(DashboardSection::DEFAULT_ORDER.len());
        for section in self.section_order {
            if !seen.contains(&section) {
                seen.push(section);
            }
        }
        for section in DashboardSection::DEFAULT_ORDER {
            if !seen.contains(&section) {
                seen.push(section);
            }
        }
        self.section_order = seen;
        self
    }
}
