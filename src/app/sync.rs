//! Reactive sync wiring: the cloud-sync toggle, cold-start pull, health
//! checks, and the sync-now flow.

use anyhow::{Context, Result};

use crate::batch::{self, SyncReport};
use crate::remote::RemoteStatus;
use crate::settings::Settings;
use crate::sync::{Category, PullOutcome};

use super::App;

impl App {
    /// Cold-start wiring, run once after construction. When cloud sync
    /// was left on, the remote is health-checked (switching sync off on
    /// failure) and then pulled so this device starts from the shared
    /// dataset.
    pub async fn startup_sync(&mut self) {
        if !self.settings.enable_cloud_sync {
            return;
        }
        let status = self.check_cloud_health().await;
        if !status.connected {
            // the health check already switched sync off
            return;
        }
        if let Some(outcome) = self.coordinator.pull_remote().await {
            if outcome.any_data() {
                self.reload_from_store();
                self.notify_info("loaded the latest data from the cloud");
            }
        }
    }

    /// Apply a settings edit. Turning cloud sync on is edge-triggered
    /// against the persisted mirror flag: the device pulls the shared
    /// dataset first and only seeds the remote with local data when the
    /// remote turns out to be empty. While sync stays on, an edit pushes
    /// the settings record alone.
    pub async fn update_settings(&mut self, new: Settings) {
        let previously_enabled = self.store.cloud_sync_flag();
        let just_enabled = new.enable_cloud_sync && !previously_enabled;

        self.settings = new;
        if let Err(e) = self.store.save_settings(&self.settings) {
            self.notify_error(format!("could not save settings: {}", e));
        }
        if let Err(e) = self.store.set_cloud_sync_flag(self.settings.enable_cloud_sync) {
            tracing::warn!("could not persist sync flag: {}", e);
        }

        if just_enabled {
            self.notify_info("cloud sync enabled, syncing...");
            match self.coordinator.pull_remote().await {
                Some(outcome) if outcome.any_data() => {
                    self.reload_from_store();
                    self.notify_success("cloud data synced to this device");
                }
                Some(outcome) if outcome.reachable => {
                    // Nothing stored remotely yet. Seed it with local
                    // data so the next device has something to pull.
                    if let Err(e) = self.sync_now().await {
                        self.notify_error(format!("could not seed cloud data: {}", e));
                    }
                }
                Some(_) => {
                    self.notify_warning("cloud unreachable, keeping local data");
                }
                None => {}
            }
        } else if self.settings.enable_cloud_sync {
            self.push_if_enabled(Category::Settings).await;
        }
    }

    /// Check remote datastore health. While sync is on, a failed check
    /// switches it off so later edits do not queue doomed pushes.
    pub async fn check_cloud_health(&mut self) -> RemoteStatus {
        let status = match self.remote.check_status().await {
            Ok(status) => status,
            Err(e) => RemoteStatus {
                enabled: false,
                connected: false,
                message: e.to_string(),
            },
        };
        if !status.connected && self.settings.enable_cloud_sync {
            self.notify_error(format!("cloud database unavailable: {}", status.message));
            self.disable_cloud_sync();
            self.notify_info("cloud sync has been switched off");
        }
        status
    }

    fn disable_cloud_sync(&mut self) {
        self.settings.enable_cloud_sync = false;
        if let Err(e) = self.store.save_settings(&self.settings) {
            tracing::warn!("could not save settings: {}", e);
        }
        if let Err(e) = self.store.set_cloud_sync_flag(false) {
            tracing::warn!("could not persist sync flag: {}", e);
        }
    }

    /// Take over a dataset shared from another device. The shared owner
    /// id replaces this device's identity, sync is forced on, and the
    /// shared data is pulled. An empty or unreachable share leaves the
    /// local data standing, with a warning.
    pub async fn adopt_shared_identity(&mut self, owner_id: &str) -> Result<()> {
        self.store
            .set_owner_id(owner_id)
            .context("could not persist the shared identity")?;
        self.settings.enable_cloud_sync = true;
        if let Err(e) = self.store.save_settings(&self.settings) {
            tracing::warn!("could not save settings: {}", e);
        }
        if let Err(e) = self.store.set_cloud_sync_flag(true) {
            tracing::warn!("could not persist sync flag: {}", e);
        }
        self.notify_info(format!("joined shared dataset {}", owner_id));

        match self.coordinator.pull_remote().await {
            Some(outcome) if outcome.any_data() => {
                self.reload_from_store();
                self.notify_success("shared data synced to this device");
            }
            Some(_) => {
                self.notify_warning("no cloud data found for this share, keeping local data");
            }
            None => {}
        }
        Ok(())
    }

    /// Push every category to the cloud right now. Disabled sync is a
    /// user-visible no-op; an unreadable trim store is the one hard
    /// failure.
    pub async fn sync_now(&mut self) -> Result<Option<SyncReport>> {
        if !self.settings.enable_cloud_sync {
            self.notify_error("enable cloud sync before syncing");
            return Ok(None);
        }
        let trim_entries = self
            .music_db
            .all_trim_settings()
            .context("could not enumerate trim settings")?;

        let report = batch::sync_all_data(
            self.remote.as_ref(),
            &self.program,
            &self.settings,
            &self.presets,
            &trim_entries,
        )
        .await;

        let r = &report.results;
        self.notify_success(format!(
            "sync finished: program {}, settings {}, preset music {}, trim settings {}/{}",
            mark(r.program),
            mark(r.settings),
            mark(r.preset_music),
            r.trim_settings,
            trim_entries.len(),
        ));
        Ok(Some(report))
    }

    /// Pull the shared dataset on demand. Returns the outcome, or None
    /// when sync is off or another sync is in flight.
    pub async fn pull_now(&mut self) -> Option<PullOutcome> {
        if !self.settings.enable_cloud_sync {
            self.notify_error("enable cloud sync before pulling");
            return None;
        }
        let outcome = self.coordinator.pull_remote().await?;
        if !outcome.reachable {
            self.notify_warning("cloud unreachable, keeping local data");
        } else if outcome.any_data() {
            self.reload_from_store();
            self.notify_success("cloud data synced to this device");
        } else {
            self.notify_info("nothing stored in the cloud yet");
        }
        Some(outcome)
    }

    /// One tick of the periodic background sync.
    pub async fn periodic_sync(&mut self) {
        if !self.settings.enable_cloud_sync {
            return;
        }
        if let Some(outcome) = self.coordinator.push_local().await {
            tracing::debug!(
                "periodic sync: program={} settings={} presets={} trim={}/{}",
                outcome.program,
                outcome.settings,
                outcome.presets,
                outcome.trim_synced,
                outcome.trim_total
            );
        }
    }

    /// Push one category when sync is on. Background pushes log their
    /// failures instead of raising notices.
    pub(crate) async fn push_if_enabled(&mut self, category: Category) {
        if !self.settings.enable_cloud_sync {
            return;
        }
        match self.coordinator.push_one(category).await {
            Some(true) => {}
            Some(false) => tracing::warn!("{} push failed", category),
            None => tracing::debug!("sync in flight, {} push skipped", category),
        }
    }

    /// Wipe this user's dataset from the remote. Local data stays.
    pub async fn clear_remote(&mut self) -> bool {
        let ok = self.remote.clear_all().await;
        if ok {
            self.notify_success("cloud data cleared");
        } else {
            self.notify_error("could not clear cloud data");
        }
        ok
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "failed"
    }
}
