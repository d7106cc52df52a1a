//! In-memory remote for the sync tests: stores everything in mutexes,
//! with per-category failure switches and per-id trim failure injection.
//!
//! Every operation suspends once (`yield_now`) before acting, so a test
//! that starts two flows without awaiting the first can observe the
//! second one hitting the in-flight guard.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::task::yield_now;

use super::{RemoteStatus, RemoteStore};
use crate::music_db::{storage_key, TrimRange, TrimSettings};
use crate::presets::PresetTrack;
use crate::program::Step;
use crate::settings::Settings;

#[derive(Default)]
pub struct MemoryRemote {
    pub program: Mutex<Option<Vec<Step>>>,
    pub settings: Mutex<Option<Settings>>,
    pub presets: Mutex<Option<Vec<PresetTrack>>>,
    /// Keyed by the prefixed id, like the real server's rows.
    pub trim: Mutex<HashMap<String, TrimRange>>,

    pub fail_program: AtomicBool,
    pub fail_settings: AtomicBool,
    pub fail_presets: AtomicBool,
    /// Raw ids whose trim pushes report failure.
    pub fail_trim_ids: Mutex<HashSet<String>>,
    /// Makes `check_status` return a transport error.
    pub unreachable: AtomicBool,

    pub push_calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_trim_for(&self, music_id: &str) {
        self.fail_trim_ids
            .lock()
            .unwrap()
            .insert(music_id.to_string());
    }

    pub fn trim_entry(&self, music_id: &str, is_preset: bool) -> Option<TrimRange> {
        self.trim
            .lock()
            .unwrap()
            .get(&storage_key(music_id, is_preset))
            .copied()
    }

    pub fn stored_program(&self) -> Option<Vec<Step>> {
        self.program.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn check_status(&self) -> Result<RemoteStatus> {
        yield_now().await;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(RemoteStatus {
            enabled: true,
            connected: true,
            message: "database connection normal".to_string(),
        })
    }

    async fn fetch_program(&self) -> Option<Vec<Step>> {
        yield_now().await;
        self.program.lock().unwrap().clone()
    }

    async fn fetch_settings(&self) -> Option<Settings> {
        yield_now().await;
        *self.settings.lock().unwrap()
    }

    async fn fetch_presets(&self) -> Option<Vec<PresetTrack>> {
        yield_now().await;
        self.presets.lock().unwrap().clone()
    }

    async fn fetch_trim_settings(&self) -> Vec<TrimSettings> {
        yield_now().await;
        self.trim
            .lock()
            .unwrap()
            .iter()
            .map(|(stored_id, range)| TrimSettings {
                music_id: stored_id.clone(),
                start: range.start,
                end: range.end,
                is_preset: stored_id.starts_with("preset:"),
            })
            .collect()
    }

    async fn sync_program(&self, steps: &[Step]) -> bool {
        yield_now().await;
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_program.load(Ordering::SeqCst) {
            return false;
        }
        *self.program.lock().unwrap() = Some(steps.to_vec());
        true
    }

    async fn sync_settings(&self, settings: &Settings) -> bool {
        yield_now().await;
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_settings.load(Ordering::SeqCst) {
            return false;
        }
        *self.settings.lock().unwrap() = Some(*settings);
        true
    }

    async fn sync_presets(&self, catalog: &[PresetTrack]) -> bool {
        yield_now().await;
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_presets.load(Ordering::SeqCst) {
            return false;
        }
        *self.presets.lock().unwrap() = Some(catalog.to_vec());
        true
    }

    async fn sync_trim(&self, music_id: &str, range: &TrimRange, is_preset: bool) -> bool {
        yield_now().await;
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_trim_ids.lock().unwrap().contains(music_id) {
            return false;
        }
        self.trim
            .lock()
            .unwrap()
            .insert(storage_key(music_id, is_preset), *range);
        true
    }

    async fn clear_all(&self) -> bool {
        yield_now().await;
        *self.program.lock().unwrap() = None;
        *self.settings.lock().unwrap() = None;
        *self.presets.lock().unwrap() = None;
        self.trim.lock().unwrap().clear();
        true
    }
}
