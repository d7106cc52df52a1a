//! Remote store gateway.
//!
//! - [`HttpRemote`]: the real server, a single action-dispatch endpoint
//!   plus a side-effect-free health check.
//!
//! The coordinator holds an `Arc<dyn RemoteStore>`, so tests swap in an
//! in-memory remote. Every operation is scoped to one owner id: an
//! opaque client-chosen token sent with each request. There is no
//! authentication behind it; whoever holds the token holds the dataset,
//! which is what the share-a-link flow depends on.

pub mod http;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use anyhow::Result;

use crate::music_db::{TrimRange, TrimSettings};
use crate::presets::PresetTrack;
use crate::program::Step;
use crate::settings::Settings;

/// Health-check result. `enabled` reflects server-side configuration,
/// `connected` whether the server can reach its datastore.
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub enabled: bool,
    pub connected: bool,
    pub message: String,
}

/// The per-user remote dataset, one operation per category action.
///
/// Sync operations return plain booleans and fetch operations return
/// `Option`/empty on failure: transport and server errors are logged at
/// the gateway and never surface as typed errors. The exception is
/// [`check_status`](RemoteStore::check_status), which callers use to
/// preflight and therefore needs to distinguish "server says no" from
/// "could not ask".
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Side-effect-free health probe.
    async fn check_status(&self) -> Result<RemoteStatus>;

    /// The remote program, or None when absent or unreachable.
    async fn fetch_program(&self) -> Option<Vec<Step>>;

    async fn fetch_settings(&self) -> Option<Settings>;

    async fn fetch_presets(&self) -> Option<Vec<PresetTrack>>;

    /// All trim entries for this owner. Ids come back exactly as the
    /// remote stores them, preset entries still carrying their
    /// `preset:` prefix; empty on failure.
    async fn fetch_trim_settings(&self) -> Vec<TrimSettings>;

    /// Replace the remote program wholesale. The remote persists array
    /// order as an explicit position column, so pushing the same
    /// sequence twice is idempotent.
    async fn sync_program(&self, steps: &[Step]) -> bool;

    /// Upsert the settings record.
    async fn sync_settings(&self, settings: &Settings) -> bool;

    /// Replace the remote preset catalog wholesale.
    async fn sync_presets(&self, catalog: &[PresetTrack]) -> bool;

    /// Upsert one trim entry. The raw id goes on the wire; the remote
    /// keys its row by the prefixed form.
    async fn sync_trim(&self, music_id: &str, range: &TrimRange, is_preset: bool) -> bool;

    /// Delete every category's rows for this owner in one operation.
    async fn clear_all(&self) -> bool;
}
