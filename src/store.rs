//! Blob-side local persistence: program, settings, and preset catalog
//! each occupy one JSON file in the data directory, plus a device record
//! (owner id, cloud-sync mirror flag, last-sync time). Trim settings and
//! uploaded audio live in the keyed store instead; the split is
//! deliberate because trim entries are touched one key at a time while
//! these categories are always replaced whole.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity;
use crate::presets::PresetTrack;
use crate::program::Step;
use crate::settings::Settings;

const PROGRAM_FILE: &str = "program.json";
const SETTINGS_FILE: &str = "settings.json";
const PRESETS_FILE: &str = "presets.json";
const DEVICE_FILE: &str = "device.json";

/// Per-device record, never synced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct DeviceState {
    owner_id: String,
    /// Mirror of `Settings::enable_cloud_sync`, persisted separately so
    /// the off→on edge survives a restart mid-transition.
    cloud_sync_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync_ms: Option<u64>,
}

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Default data directory: {data_dir}/aisle
    pub fn default_dir() -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .context("failed to get data directory")?
            .join("aisle");
        Ok(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ── Category blobs ───────────────────────────────────────────────

    pub fn load_program(&self) -> Option<Vec<Step>> {
        self.read_blob(PROGRAM_FILE)
    }

    pub fn save_program(&self, steps: &[Step]) -> Result<()> {
        self.write_blob(PROGRAM_FILE, &steps)
    }

    pub fn load_settings(&self) -> Option<Settings> {
        self.read_blob(SETTINGS_FILE)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_blob(SETTINGS_FILE, settings)
    }

    pub fn load_presets(&self) -> Option<Vec<PresetTrack>> {
        self.read_blob(PRESETS_FILE)
    }

    pub fn save_presets(&self, catalog: &[PresetTrack]) -> Result<()> {
        self.write_blob(PRESETS_FILE, &catalog)
    }

    /// Remove the three category blobs (reset-to-defaults). The device
    /// record, trim settings, and uploaded audio are left alone.
    pub fn clear_blobs(&self) -> Result<()> {
        for file in [PROGRAM_FILE, SETTINGS_FILE, PRESETS_FILE] {
            let path = self.dir.join(file);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }

    // ── Device record ────────────────────────────────────────────────

    /// The owner id for this device, generating and persisting a fresh
    /// one on first use.
    pub fn owner_id(&self) -> Result<String> {
        let mut device = self.device();
        if device.owner_id.is_empty() {
            device.owner_id = identity::generate_owner_id();
            self.write_blob(DEVICE_FILE, &device)?;
        }
        Ok(device.owner_id)
    }

    /// Overwrite the owner id (shared-link adoption).
    pub fn set_owner_id(&self, owner_id: &str) -> Result<()> {
        let mut device = self.device();
        device.owner_id = owner_id.to_string();
        self.write_blob(DEVICE_FILE, &device)
    }

    /// The persisted cloud-sync mirror flag (not the Settings blob).
    pub fn cloud_sync_flag(&self) -> bool {
        self.device().cloud_sync_enabled
    }

    pub fn set_cloud_sync_flag(&self, enabled: bool) -> Result<()> {
        let mut device = self.device();
        device.cloud_sync_enabled = enabled;
        self.write_blob(DEVICE_FILE, &device)
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.device()
            .last_sync_ms
            .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
    }

    pub fn set_last_sync_ms(&self, ms: u64) -> Result<()> {
        let mut device = self.device();
        device.last_sync_ms = Some(ms);
        self.write_blob(DEVICE_FILE, &device)
    }

    fn device(&self) -> DeviceState {
        self.read_blob(DEVICE_FILE).unwrap_or_default()
    }

    // ── File plumbing ────────────────────────────────────────────────

    fn read_blob<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.dir.join(file);
        if !path.exists() {
            return None;
        }
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("could not read {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{} is corrupt, ignoring it: {}", path.display(), e);
                None
            }
        }
    }

    /// Serialize to a temp file, then rename into place, so a failed
    /// write never leaves a half-written blob behind.
    fn write_blob<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{}.tmp", file));
        let contents = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize {}", file))?;
        fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}
