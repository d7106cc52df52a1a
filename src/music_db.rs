//! Keyed local store backed by redb. Three tables:
//!   trim_settings:  prefixed music id → {start, end}
//!   audio_meta:     upload id         → {name, mime, added_ms}
//!   audio_data:     upload id         → raw file bytes
//!
//! Trim entries for preset tracks share an id space with uploaded tracks,
//! so preset keys carry a `preset:` prefix. Uploaded audio is keyed by a
//! generated id (millisecond timestamp + random suffix) that never
//! collides with the trim key space on its own; deleting an upload also
//! removes its trim entry in the same write transaction.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::identity::random_token;

const TRIM: TableDefinition<&str, &[u8]> = TableDefinition::new("trim_settings");
const AUDIO_META: TableDefinition<&str, &[u8]> = TableDefinition::new("audio_meta");
const AUDIO_DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("audio_data");

const MUSIC_DB_FILE: &str = "music.redb";
const PRESET_PREFIX: &str = "preset:";
const UPLOAD_SUFFIX_LEN: usize = 9;

/// Start/end playback offsets in seconds. `end == 0.0` means "play to
/// the end of the track".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
}

/// One trim entry as enumerated for sync. `music_id` is the raw id here;
/// the `preset:` prefix lives only in storage keys (and in what the
/// remote side reports back from its own keyed rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimSettings {
    pub music_id: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub is_preset: bool,
}

/// Metadata for one uploaded audio file. The bytes live in a separate
/// table and are only loaded on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicInfo {
    pub id: String,
    pub name: String,
    pub mime: String,
    pub date_added: DateTime<Utc>,
}

/// Serialized forms stored as JSON bytes in redb.
#[derive(Serialize, Deserialize)]
struct StoredTrim {
    start: f64,
    end: f64,
}

#[derive(Serialize, Deserialize)]
struct StoredAudio {
    name: String,
    mime: String,
    added_ms: u64,
}

impl StoredAudio {
    fn to_info(&self, id: &str) -> MusicInfo {
        let date_added =
            DateTime::from_timestamp_millis(self.added_ms as i64).unwrap_or_else(Utc::now);
        MusicInfo {
            id: id.to_string(),
            name: self.name.clone(),
            mime: self.mime.clone(),
            date_added,
        }
    }
}

/// The storage key for a trim entry: preset entries are disambiguated
/// with a prefix so a preset and an upload sharing a raw id stay
/// distinct.
pub fn storage_key(music_id: &str, is_preset: bool) -> String {
    if is_preset {
        format!("{}{}", PRESET_PREFIX, music_id)
    } else {
        music_id.to_string()
    }
}

/// Strip the preset prefix from a possibly-prefixed id.
pub fn raw_music_id(stored_id: &str) -> &str {
    stored_id.strip_prefix(PRESET_PREFIX).unwrap_or(stored_id)
}

pub struct MusicDb {
    db: Database,
}

impl MusicDb {
    /// Open or create the database inside a data directory.
    pub fn open_in(dir: &Path) -> Result<Self> {
        Self::create(&dir.join(MUSIC_DB_FILE))
    }

    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("failed to open music database at {}", path.display()))?;
        // Ensure tables exist
        {
            let txn = db.begin_write()?;
            txn.open_table(TRIM)?;
            txn.open_table(AUDIO_META)?;
            txn.open_table(AUDIO_DATA)?;
            txn.commit()?;
        }
        Ok(Self { db })
    }

    // ── Trim settings ────────────────────────────────────────────────

    /// Upsert the trim range for a track.
    pub fn save_trim(&self, music_id: &str, range: &TrimRange, is_preset: bool) -> Result<()> {
        let key = storage_key(music_id, is_preset);
        let data = serde_json::to_vec(&StoredTrim {
            start: range.start,
            end: range.end,
        })?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TRIM)?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_trim(&self, music_id: &str, is_preset: bool) -> Result<Option<TrimRange>> {
        let key = storage_key(music_id, is_preset);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TRIM)?;
        match table.get(key.as_str())? {
            Some(data) => {
                let stored: StoredTrim = serde_json::from_slice(data.value())
                    .context("corrupt trim record in music database")?;
                Ok(Some(TrimRange {
                    start: stored.start,
                    end: stored.end,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn delete_trim(&self, music_id: &str, is_preset: bool) -> Result<()> {
        let key = storage_key(music_id, is_preset);
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TRIM)?;
            table.remove(key.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Enumerate every trim entry, raw ids with the preset flag split
    /// back out of the key.
    pub fn all_trim_settings(&self) -> Result<Vec<TrimSettings>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TRIM)?;
        let mut entries = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            let stored: StoredTrim = serde_json::from_slice(value.value())
                .context("corrupt trim record in music database")?;
            let stored_id = key.value();
            let is_preset = stored_id.starts_with(PRESET_PREFIX);
            entries.push(TrimSettings {
                music_id: raw_music_id(stored_id).to_string(),
                start: stored.start,
                end: stored.end,
                is_preset,
            });
        }
        Ok(entries)
    }

    // ── Uploaded audio ───────────────────────────────────────────────

    /// Store an uploaded audio file. Unlike the sync paths, a failure
    /// here propagates: losing an upload silently is not acceptable.
    pub fn save_audio(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<MusicInfo> {
        let now = Utc::now();
        let id = format!(
            "{}-{}",
            now.timestamp_millis(),
            random_token(UPLOAD_SUFFIX_LEN)
        );
        let meta = StoredAudio {
            name: name.to_string(),
            mime: mime.to_string(),
            added_ms: now.timestamp_millis() as u64,
        };
        let meta_json = serde_json::to_vec(&meta)?;

        let txn = self.db.begin_write()?;
        {
            let mut meta_table = txn.open_table(AUDIO_META)?;
            meta_table.insert(id.as_str(), meta_json.as_slice())?;
            let mut data_table = txn.open_table(AUDIO_DATA)?;
            data_table.insert(id.as_str(), bytes)?;
        }
        txn.commit()
            .with_context(|| format!("failed to store uploaded audio \"{}\"", name))?;
        Ok(meta.to_info(&id))
    }

    pub fn audio_info(&self, id: &str) -> Result<Option<MusicInfo>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(AUDIO_META)?;
        match table.get(id)? {
            Some(data) => {
                let stored: StoredAudio = serde_json::from_slice(data.value())
                    .context("corrupt audio record in music database")?;
                Ok(Some(stored.to_info(id)))
            }
            None => Ok(None),
        }
    }

    pub fn audio_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(AUDIO_DATA)?;
        Ok(table.get(id)?.map(|guard| guard.value().to_vec()))
    }

    /// Metadata for every upload, oldest first (ids sort by timestamp).
    pub fn list_audio(&self) -> Result<Vec<MusicInfo>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(AUDIO_META)?;
        let mut infos = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            let stored: StoredAudio = serde_json::from_slice(value.value())
                .context("corrupt audio record in music database")?;
            infos.push(stored.to_info(key.value()));
        }
        Ok(infos)
    }

    /// Delete an upload and, in the same transaction, its trim entry.
    /// Returns false if no such upload existed.
    pub fn delete_audio(&self, id: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let existed;
        {
            let mut meta_table = txn.open_table(AUDIO_META)?;
            existed = meta_table.remove(id)?.is_some();
            let mut data_table = txn.open_table(AUDIO_DATA)?;
            data_table.remove(id)?;
            let mut trim_table = txn.open_table(TRIM)?;
            trim_table.remove(storage_key(id, false).as_str())?;
        }
        txn.commit()?;
        Ok(existed)
    }

    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "aisle-music-test-{}-{}.redb",
            std::process::id(),
            n
        ));
        Self::create(&path)
    }
}
