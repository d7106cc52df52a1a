//! Sync coordinator: decides which side wins per category and keeps
//! local and remote convergent, without ever running two syncs at once.
//!
//! The in-flight guard and last-sync stamp are instance fields, so two
//! coordinators (say, in tests) never interfere. A blocked invocation
//! returns immediately; nothing queues.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::music_db::{raw_music_id, MusicDb, TrimRange};
use crate::remote::RemoteStore;
use crate::store::LocalStore;

/// One of the four synced data domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Program,
    Settings,
    PresetMusic,
    TrimSettings,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Program => "program",
            Category::Settings => "settings",
            Category::PresetMusic => "preset music",
            Category::TrimSettings => "trim settings",
        };
        write!(f, "{}", name)
    }
}

/// Per-category result of one push flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOutcome {
    pub program: bool,
    pub settings: bool,
    pub presets: bool,
    pub trim_synced: usize,
    pub trim_total: usize,
}

impl PushOutcome {
    /// True when any category changed remote state.
    pub fn any_synced(&self) -> bool {
        self.program || self.settings || self.presets || self.trim_synced > 0
    }

    /// The trim step counts as successful when at least one entry made
    /// it, or trivially when there was nothing to push.
    pub fn trim_ok(&self) -> bool {
        self.trim_total == 0 || self.trim_synced > 0
    }
}

/// Per-category result of one pull flow. `reachable: false` means the
/// preflight failed and local data stands untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullOutcome {
    pub reachable: bool,
    pub program: bool,
    pub settings: bool,
    pub presets: bool,
    pub trim_merged: usize,
}

impl PullOutcome {
    fn unreachable() -> Self {
        Self::default()
    }

    /// True when the remote held data for any category.
    pub fn any_data(&self) -> bool {
        self.program || self.settings || self.presets || self.trim_merged > 0
    }
}

pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    music: Arc<MusicDb>,
    remote: Arc<dyn RemoteStore>,
    in_flight: AtomicBool,
    last_sync_ms: AtomicU64,
}

impl SyncCoordinator {
    pub fn new(store: Arc<LocalStore>, music: Arc<MusicDb>, remote: Arc<dyn RemoteStore>) -> Self {
        let last_sync_ms = store
            .last_sync()
            .map(|t| t.timestamp_millis() as u64)
            .unwrap_or(0);
        Self {
            store,
            music,
            remote,
            in_flight: AtomicBool::new(false),
            last_sync_ms: AtomicU64::new(last_sync_ms),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        match self.last_sync_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms as i64),
        }
    }

    /// Take the guard. False means another sync holds it.
    fn begin(&self) -> bool {
        !self.in_flight.swap(true, Ordering::SeqCst)
    }

    /// Stamp the completion time and release the guard. The stamp is
    /// recorded regardless of per-category outcomes.
    fn finish(&self) {
        let now = Utc::now().timestamp_millis() as u64;
        self.last_sync_ms.store(now, Ordering::SeqCst);
        if let Err(e) = self.store.set_last_sync_ms(now) {
            tracing::warn!("could not persist last-sync time: {}", e);
        }
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// Push every category local→remote. Returns None when another sync
    /// is already in flight.
    pub async fn push_local(&self) -> Option<PushOutcome> {
        if !self.begin() {
            tracing::debug!("sync already in progress, push skipped");
            return None;
        }
        let outcome = self.push_all_categories().await;
        self.finish();
        Some(outcome)
    }

    /// Push a single category local→remote. Returns None when another
    /// sync is already in flight.
    pub async fn push_one(&self, category: Category) -> Option<bool> {
        if !self.begin() {
            tracing::debug!("sync already in progress, {} push skipped", category);
            return None;
        }
        let ok = match category {
            Category::Program => self.push_program().await,
            Category::Settings => self.push_settings().await,
            Category::PresetMusic => self.push_presets().await,
            Category::TrimSettings => {
                let (synced, total) = self.push_trim_entries().await;
                total == 0 || synced > 0
            }
        };
        self.finish();
        Some(ok)
    }

    /// Pull remote→local with a health preflight. Returns None when
    /// another sync is already in flight.
    pub async fn pull_remote(&self) -> Option<PullOutcome> {
        if !self.begin() {
            tracing::debug!("sync already in progress, pull skipped");
            return None;
        }
        let outcome = self.pull_and_merge().await;
        self.finish();
        Some(outcome)
    }

    async fn push_all_categories(&self) -> PushOutcome {
        // Categories fail independently; one bad push never blocks the
        // rest.
        let program = self.push_program().await;
        let settings = self.push_settings().await;
        let presets = self.push_presets().await;
        let (trim_synced, trim_total) = self.push_trim_entries().await;

        let outcome = PushOutcome {
            program,
            settings,
            presets,
            trim_synced,
            trim_total,
        };
        tracing::debug!(
            "push done: program={} settings={} presets={} trim={}/{}",
            program,
            settings,
            presets,
            trim_synced,
            trim_total
        );
        outcome
    }

    async fn push_program(&self) -> bool {
        match self.store.load_program() {
            Some(steps) if !steps.is_empty() => self.remote.sync_program(&steps).await,
            _ => false,
        }
    }

    async fn push_settings(&self) -> bool {
        match self.store.load_settings() {
            Some(settings) => self.remote.sync_settings(&settings).await,
            None => false,
        }
    }

    async fn push_presets(&self) -> bool {
        match self.store.load_presets() {
            Some(catalog) if !catalog.is_empty() => self.remote.sync_presets(&catalog).await,
            _ => false,
        }
    }

    /// Push every local trim entry individually, counting successes.
    async fn push_trim_entries(&self) -> (usize, usize) {
        let entries = match self.music.all_trim_settings() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("could not enumerate trim settings: {}", e);
                return (0, 0);
            }
        };
        let total = entries.len();
        let mut synced = 0;
        for entry in &entries {
            let range = TrimRange {
                start: entry.start,
                end: entry.end,
            };
            if self
                .remote
                .sync_trim(&entry.music_id, &range, entry.is_preset)
                .await
            {
                synced += 1;
            }
        }
        (synced, total)
    }

    async fn pull_and_merge(&self) -> PullOutcome {
        // Preflight. An unreachable remote abandons the pull; local data
        // is used as-is.
        match self.remote.check_status().await {
            Ok(status) if status.connected => {}
            Ok(status) => {
                tracing::warn!("remote datastore unavailable: {}", status.message);
                return PullOutcome::unreachable();
            }
            Err(e) => {
                tracing::warn!("remote unreachable: {}", e);
                return PullOutcome::unreachable();
            }
        }

        let mut outcome = PullOutcome {
            reachable: true,
            ..PullOutcome::default()
        };

        if let Some(steps) = self.remote.fetch_program().await {
            if !steps.is_empty() {
                match self.store.save_program(&steps) {
                    Ok(()) => outcome.program = true,
                    Err(e) => tracing::warn!("could not store pulled program: {}", e),
                }
            }
        }

        if let Some(mut settings) = self.remote.fetch_settings().await {
            // A pull only runs while sync is on; the adopted record must
            // not switch it back off.
            settings.enable_cloud_sync = true;
            match self.store.save_settings(&settings) {
                Ok(()) => outcome.settings = true,
                Err(e) => tracing::warn!("could not store pulled settings: {}", e),
            }
        }

        if let Some(catalog) = self.remote.fetch_presets().await {
            if !catalog.is_empty() {
                match self.store.save_presets(&catalog) {
                    Ok(()) => outcome.presets = true,
                    Err(e) => tracing::warn!("could not store pulled presets: {}", e),
                }
            }
        }

        outcome.trim_merged = self.merge_trim_entries().await;
        outcome
    }

    /// Trim settings are a keyed set, so remote entries merge one by
    /// one instead of replacing the local store wholesale.
    async fn merge_trim_entries(&self) -> usize {
        let mut merged = 0;
        for entry in self.remote.fetch_trim_settings().await {
            let raw_id = if entry.is_preset {
                raw_music_id(&entry.music_id).to_string()
            } else {
                entry.music_id.clone()
            };
            let incoming = TrimRange {
                start: entry.start,
                end: entry.end,
            };
            let local = match self.music.get_trim(&raw_id, entry.is_preset) {
                Ok(local) => local,
                Err(e) => {
                    tracing::warn!("could not read trim entry {}: {}", raw_id, e);
                    continue;
                }
            };
            let differs = local
                .map(|l| l.start != incoming.start || l.end != incoming.end)
                .unwrap_or(true);
            if differs {
                match self.music.save_trim(&raw_id, &incoming, entry.is_preset) {
                    Ok(()) => merged += 1,
                    Err(e) => tracing::warn!("could not store trim entry {}: {}", raw_id, e),
                }
            }
        }
        merged
    }
}
