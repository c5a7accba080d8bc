//! UI Preferences
//!
//! Per-page dark-mode flag behind a small key-value store, plus the pure
//! mapping from UI state to what the page should show.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::sources::Body;

const ENABLED: &str = "enabled";
const DISABLED: &str = "disabled";

/// Errors from preference storage
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key-value storage for UI preferences
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

fn lock(map: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, rewritten on every `set`
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();

        let values = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = values.len(), "Opened preference file");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Default location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quakewatch")
            .join("preferences.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = lock(&self.values);
        let previous = values.insert(key.to_string(), value.to_string());

        let written = serde_json::to_string_pretty(&*values)
            .map_err(PreferenceError::from)
            .and_then(|json| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, json)?;
                Ok(())
            });

        // Keep memory and disk in agreement
        if written.is_err() {
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
        }
        written
    }
}

/// Dark-mode state of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiState {
    pub page: String,
    pub dark_mode: bool,
}

/// What the page applies for a given state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTheme {
    /// Class added to the page body, if any
    pub body_class: Option<String>,
    /// Icon shown on the toggle button
    pub toggle_icon: String,
}

impl UiState {
    pub fn key(page: &str) -> String {
        format!("{}.darkMode", page)
    }

    /// Read the stored flag; anything but "enabled" means off
    pub fn load(store: &dyn PreferenceStore, page: &str) -> Self {
        let dark_mode = store.get(&Self::key(page)).as_deref() == Some(ENABLED);
        Self {
            page: page.to_string(),
            dark_mode,
        }
    }

    /// Flip the flag and persist it
    pub fn toggle(&mut self, store: &dyn PreferenceStore) -> Result<(), PreferenceError> {
        let dark_mode = !self.dark_mode;
        let value = if dark_mode { ENABLED } else { DISABLED };
        store.set(&Self::key(&self.page), value)?;
        self.dark_mode = dark_mode;

        tracing::debug!(page = %self.page, dark_mode, "Toggled dark mode");
        Ok(())
    }

    pub fn apply(&self) -> AppliedTheme {
        if self.dark_mode {
            AppliedTheme {
                body_class: Some("dark-mode".to_string()),
                toggle_icon: "☀️".to_string(),
            }
        } else {
            AppliedTheme {
                body_class: None,
                toggle_icon: "🌙".to_string(),
            }
        }
    }
}

/// Display state of one body's section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDisplay {
    pub section: Body,
    pub visible: bool,
}

/// Show the selected body's section and hide the others
pub fn section_visibility(selected: Body) -> Vec<SectionDisplay> {
    Body::all()
        .iter()
        .map(|&section| SectionDisplay {
            section,
            visible: section == selected,
        })
        .collect()
}
