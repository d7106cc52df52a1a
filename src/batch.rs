//! Batch sync: the user-invoked "sync now" that pushes all four
//! categories as one logical operation and reports per-category results.
//!
//! The three blob categories are pushed concurrently; trim entries go
//! one at a time in array order, because there can be many of them and
//! a burst of parallel per-item requests would hammer the remote.

use serde::Serialize;

use crate::music_db::{TrimRange, TrimSettings};
use crate::presets::PresetTrack;
use crate::program::Step;
use crate::remote::RemoteStore;
use crate::settings::Settings;

/// Outcome of one batch sync. `success` means the operation ran to
/// completion; whether each category actually made it is in `results`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub results: BatchResults,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResults {
    pub program: bool,
    pub settings: bool,
    pub preset_music: bool,
    /// How many trim entries were stored, out of however many were
    /// passed in.
    pub trim_settings: usize,
}

/// Push everything. Category failures are absorbed into the report and
/// never abort the rest.
pub async fn sync_all_data(
    remote: &dyn RemoteStore,
    program: &[Step],
    settings: &Settings,
    catalog: &[PresetTrack],
    trim_entries: &[TrimSettings],
) -> SyncReport {
    // Parallel phase. These three are independent and idempotent, so
    // their relative order doesn't matter.
    let (program_ok, settings_ok, presets_ok) = tokio::join!(
        remote.sync_program(program),
        remote.sync_settings(settings),
        remote.sync_presets(catalog),
    );

    // Serial phase, counting successes per entry.
    let mut synced = 0usize;
    for entry in trim_entries {
        if entry.music_id.is_empty() {
            continue;
        }
        let range = TrimRange {
            start: entry.start,
            end: entry.end,
        };
        if remote
            .sync_trim(&entry.music_id, &range, entry.is_preset)
            .await
        {
            synced += 1;
        }
    }

    tracing::debug!(
        "batch sync: program={} settings={} presets={} trim={}/{}",
        program_ok,
        settings_ok,
        presets_ok,
        synced,
        trim_entries.len()
    );

    SyncReport {
        success: true,
        results: BatchResults {
            program: program_ok,
            settings: settings_ok,
            preset_music: presets_ok,
            trim_settings: synced,
        },
    }
}
