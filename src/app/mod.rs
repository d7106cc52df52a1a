mod sync;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::identity;
use crate::music_db::{MusicDb, MusicInfo};
use crate::presets::{self, PresetTrack};
use crate::program::{self, Step};
use crate::remote::http::HttpRemote;
use crate::remote::RemoteStore;
use crate::settings::Settings;
use crate::store::LocalStore;
use crate::sync::{Category, SyncCoordinator};

const MAX_NOTICES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible message, the headless equivalent of a toast.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub struct App {
    // Ceremony state
    pub program: Vec<Step>,
    pub current_step: usize,
    pub settings: Settings,
    pub presets: Vec<PresetTrack>,
    pub uploads: Vec<MusicInfo>,

    // Storage and sync
    pub store: Arc<LocalStore>,
    pub music_db: Arc<MusicDb>,
    pub remote: Arc<dyn RemoteStore>,
    pub coordinator: SyncCoordinator,

    // User-visible messages, newest last
    pub notices: VecDeque<Notice>,

    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let store = Arc::new(LocalStore::open(&data_dir)?);
        let music_db = Arc::new(MusicDb::open_in(&data_dir)?);

        let owner_id = store.owner_id()?;
        let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemote::new(
            &config.cloud.server_url,
            &owner_id,
            Duration::from_secs(config.cloud.request_timeout_secs),
        )?);

        Self::from_parts(config, store, music_db, remote)
    }

    /// Assemble an app from already-open stores and a remote. `new`
    /// delegates here; tests hand in an in-memory remote.
    pub fn from_parts(
        config: Config,
        store: Arc<LocalStore>,
        music_db: Arc<MusicDb>,
        remote: Arc<dyn RemoteStore>,
    ) -> Result<Self> {
        let (program, settings) = Self::load_from_local_storage(&store);
        let presets = store.load_presets().unwrap_or_else(presets::default_presets);
        let uploads = music_db.list_audio().unwrap_or_else(|e| {
            tracing::warn!("could not list uploaded music: {}", e);
            Vec::new()
        });
        let coordinator =
            SyncCoordinator::new(store.clone(), music_db.clone(), remote.clone());

        Ok(Self {
            program,
            current_step: 0,
            settings,
            presets,
            uploads,
            store,
            music_db,
            remote,
            coordinator,
            notices: VecDeque::new(),
            config,
        })
    }

    /// Saved local state, or the built-in defaults where nothing is
    /// saved yet.
    fn load_from_local_storage(store: &LocalStore) -> (Vec<Step>, Settings) {
        let program = store.load_program().unwrap_or_else(program::default_program);
        let settings = store.load_settings().unwrap_or_default();
        (program, settings)
    }

    /// Refresh in-memory state from the blobs after a pull rewrote
    /// them.
    pub(crate) fn reload_from_store(&mut self) {
        let (program, settings) = Self::load_from_local_storage(&self.store);
        self.program = program;
        self.settings = settings;
        self.presets = self
            .store
            .load_presets()
            .unwrap_or_else(presets::default_presets);
        self.current_step = self.current_step.min(self.program.len().saturating_sub(1));
    }

    // ── Notices ──────────────────────────────────────────────────────

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Warning | NoticeLevel::Error => tracing::warn!("{}", message),
            _ => tracing::info!("{}", message),
        }
        self.notices.push_back(Notice {
            level,
            message,
            timestamp: Utc::now(),
        });
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    pub fn notify_info(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    pub fn notify_success(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub fn notify_warning(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Warning, message);
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }

    // ── Step runner ──────────────────────────────────────────────────

    pub fn next_step(&mut self) {
        if self.current_step + 1 < self.program.len() {
            self.current_step += 1;
        }
    }

    pub fn previous_step(&mut self) {
        self.current_step = self.current_step.saturating_sub(1);
    }

    pub fn jump_to(&mut self, index: usize) {
        self.current_step = index.min(self.program.len().saturating_sub(1));
    }

    /// Planned length of the whole ceremony, in minutes.
    pub fn total_duration(&self) -> u32 {
        self.program.iter().map(|s| s.duration).sum()
    }

    // ── Program ──────────────────────────────────────────────────────

    /// Replace the program wholesale, persist it, and push it when sync
    /// is on.
    pub async fn update_program(&mut self, mut steps: Vec<Step>) {
        for step in &mut steps {
            step.duration = step.duration.max(1);
        }
        self.program = steps;
        self.current_step = self.current_step.min(self.program.len().saturating_sub(1));
        self.persist_program();
        self.push_if_enabled(Category::Program).await;
    }

    fn persist_program(&mut self) {
        if let Err(e) = self.store.save_program(&self.program) {
            self.notify_error(format!("could not save program: {}", e));
        }
    }

    // ── Preset catalog ───────────────────────────────────────────────

    /// Add a preset track. Duplicate names or paths are rejected and
    /// the error carries the reason.
    pub async fn add_preset(
        &mut self,
        name: &str,
        path: &str,
        category: &str,
    ) -> Result<PresetTrack> {
        let track = presets::add_track(&mut self.presets, name, path, category)?;
        self.persist_presets();
        self.push_if_enabled(Category::PresetMusic).await;
        Ok(track)
    }

    pub async fn update_preset(
        &mut self,
        id: &str,
        name: Option<&str>,
        path: Option<&str>,
        category: Option<&str>,
    ) -> Result<PresetTrack> {
        let old_path = self
            .presets
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.path.clone());
        let updated = presets::update_track(&mut self.presets, id, name, path, category)?;
        self.persist_presets();

        // A re-pathed preset leaves steps pointing at the old path.
        if let Some(old_path) = old_path.filter(|p| *p != updated.path) {
            if program::scrub_preset_paths(&mut self.program, &[old_path]) {
                self.persist_program();
                self.push_if_enabled(Category::Program).await;
            }
        }
        self.push_if_enabled(Category::PresetMusic).await;
        Ok(updated)
    }

    /// Remove a preset track and detach any steps that used it.
    pub async fn delete_preset(&mut self, id: &str) -> Option<PresetTrack> {
        let removed = presets::remove_track(&mut self.presets, id)?;
        self.persist_presets();

        if program::scrub_preset_paths(&mut self.program, &[removed.path.clone()]) {
            self.persist_program();
            self.push_if_enabled(Category::Program).await;
        }
        self.push_if_enabled(Category::PresetMusic).await;
        Some(removed)
    }

    fn persist_presets(&mut self) {
        if let Err(e) = self.store.save_presets(&self.presets) {
            self.notify_error(format!("could not save preset catalog: {}", e));
        }
    }

    // ── Uploaded music ───────────────────────────────────────────────

    /// Store an uploaded audio file. Failures propagate: a silently
    /// dropped upload is user-visible data loss.
    pub fn add_music(&mut self, name: &str, mime: &str, bytes: &[u8]) -> Result<MusicInfo> {
        let info = self.music_db.save_audio(name, mime, bytes)?;
        self.uploads.push(info.clone());
        Ok(info)
    }

    /// Delete an upload. Its trim entry goes with it, and steps that
    /// played it are detached.
    pub async fn delete_music(&mut self, id: &str) -> Result<bool> {
        let existed = self.music_db.delete_audio(id)?;
        if !existed {
            return Ok(false);
        }
        self.uploads.retain(|u| u.id != id);
        if program::scrub_upload_reference(&mut self.program, id) {
            self.persist_program();
            self.push_if_enabled(Category::Program).await;
        }
        Ok(true)
    }

    // ── Reset / identity ─────────────────────────────────────────────

    /// Discard the three local blob categories and return to the
    /// built-in defaults. Uploads and trim settings are kept, as is the
    /// owner id.
    pub fn reset_local(&mut self) -> Result<()> {
        self.store.clear_blobs().context("could not clear local data")?;
        self.program = program::default_program();
        self.settings = Settings::default();
        self.presets = presets::default_presets();
        self.current_step = 0;
        if let Err(e) = self.store.set_cloud_sync_flag(false) {
            tracing::warn!("could not reset sync flag: {}", e);
        }
        self.notify_info("local data reset to defaults");
        Ok(())
    }

    /// The link another device opens to share this dataset.
    pub fn share_link(&self) -> Result<String> {
        let owner_id = self.store.owner_id()?;
        Ok(identity::share_link(&self.config.cloud.server_url, &owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music_db::TrimRange;
    use crate::remote::testing::MemoryRemote;
    use tempfile::TempDir;

    pub(super) struct Fixture {
        pub _dir: TempDir,
        pub store: Arc<LocalStore>,
        pub remote: Arc<MemoryRemote>,
        pub app: App,
    }

    pub(super) fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::open(dir.path()).unwrap());
        let music_db = Arc::new(MusicDb::new_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let app = App::from_parts(
            Config::default(),
            store.clone(),
            music_db.clone(),
            remote.clone() as Arc<dyn RemoteStore>,
        )
        .unwrap();
        Fixture {
            _dir: dir,
            store,
            remote,
            app,
        }
    }

    pub(super) fn has_notice(app: &App, level: NoticeLevel, needle: &str) -> bool {
        app.notices
            .iter()
            .any(|n| n.level == level && n.message.contains(needle))
    }

    #[test]
    fn test_fresh_profile_gets_defaults() {
        let f = fixture();

        assert_eq!(f.app.program.len(), 10);
        assert_eq!(f.app.program[0].name, "Guest arrival");
        assert!(f.app.settings.auto_play_music);
        assert!(f.app.settings.auto_start_timer);
        assert!(!f.app.settings.enable_cloud_sync);
        assert!(!f.app.presets.is_empty());
        assert!(f.app.uploads.is_empty());
    }

    #[test]
    fn test_saved_state_wins_over_defaults() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::open(dir.path()).unwrap());
        let mut saved = crate::program::default_program();
        saved.truncate(4);
        store.save_program(&saved).unwrap();

        let music_db = Arc::new(MusicDb::new_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let app = App::from_parts(
            Config::default(),
            store,
            music_db,
            remote as Arc<dyn RemoteStore>,
        )
        .unwrap();

        assert_eq!(app.program.len(), 4);
    }

    #[test]
    fn test_step_navigation_clamps() {
        let mut f = fixture();

        f.app.jump_to(99);
        assert_eq!(f.app.current_step, 9);

        f.app.next_step();
        assert_eq!(f.app.current_step, 9, "cannot walk past the last step");

        f.app.previous_step();
        assert_eq!(f.app.current_step, 8);

        f.app.jump_to(0);
        f.app.previous_step();
        assert_eq!(f.app.current_step, 0);
    }

    #[test]
    fn test_total_duration() {
        let f = fixture();
        assert_eq!(f.app.total_duration(), 90);
    }

    #[tokio::test]
    async fn test_update_program_persists_and_clamps() {
        let mut f = fixture();
        let mut steps = crate::program::default_program();
        steps.truncate(2);
        steps[1].duration = 0;
        f.app.jump_to(9);

        f.app.update_program(steps).await;

        assert_eq!(f.app.program.len(), 2);
        assert_eq!(f.app.program[1].duration, 1);
        assert_eq!(f.app.current_step, 1);
        assert_eq!(f.store.load_program().unwrap().len(), 2);
        assert!(
            f.remote.stored_program().is_none(),
            "no push while sync is off"
        );
    }

    #[tokio::test]
    async fn test_program_update_pushes_when_enabled() {
        let mut f = fixture();
        f.app.settings.enable_cloud_sync = true;
        f.store.save_settings(&f.app.settings).unwrap();
        f.store.set_cloud_sync_flag(true).unwrap();

        f.app.update_program(crate::program::default_program()).await;

        assert_eq!(f.remote.stored_program().unwrap().len(), 10);
        assert!(
            f.remote.settings.lock().unwrap().is_none(),
            "a program edit pushes the program only"
        );
    }

    #[tokio::test]
    async fn test_add_preset_rejects_duplicates() {
        let mut f = fixture();
        let count = f.app.presets.len();

        let err = f.app.add_preset("Wedding March", "/audio/x.mp3", "").await;

        assert!(err.is_err());
        assert_eq!(f.app.presets.len(), count);
    }

    #[tokio::test]
    async fn test_delete_preset_detaches_steps() {
        let mut f = fixture();
        f.app.program[0].music = "/audio/canon-in-d.mp3".to_string();
        f.app.program[0].music_name = "Canon in D".to_string();
        f.app.program[0].is_preset = true;

        let removed = f.app.delete_preset("p2").await.unwrap();

        assert_eq!(removed.name, "Canon in D");
        assert!(f.app.program[0].music.is_empty());
        assert!(!f.app.program[0].is_preset);
        // the detached program was persisted too
        assert!(f.store.load_program().unwrap()[0].music.is_empty());
    }

    #[tokio::test]
    async fn test_repath_preset_detaches_old_path() {
        let mut f = fixture();
        f.app.program[3].music = "/audio/clair-de-lune.mp3".to_string();
        f.app.program[3].is_preset = true;

        f.app
            .update_preset("p5", None, Some("/audio/clair-de-lune-piano.mp3"), None)
            .await
            .unwrap();

        assert!(f.app.program[3].music.is_empty());
    }

    #[tokio::test]
    async fn test_upload_delete_cascades() {
        let mut f = fixture();
        let info = f.app.add_music("march.mp3", "audio/mpeg", &[1, 2, 3]).unwrap();
        f.app
            .music_db
            .save_trim(&info.id, &TrimRange { start: 3.0, end: 20.0 }, false)
            .unwrap();
        f.app.program[1].music_source = info.id.clone();
        f.app.program[1].music_name = "march.mp3".to_string();

        let deleted = f.app.delete_music(&info.id).await.unwrap();

        assert!(deleted);
        assert!(f.app.uploads.is_empty());
        assert!(f.app.music_db.get_trim(&info.id, false).unwrap().is_none());
        assert!(f.app.program[1].music_source.is_empty());
        assert!(!f.app.delete_music(&info.id).await.unwrap());
    }

    #[test]
    fn test_reset_local_restores_defaults() {
        let mut f = fixture();
        f.app.program.truncate(2);
        f.app.settings.enable_cloud_sync = true;
        f.store.save_program(&f.app.program).unwrap();
        f.store.set_cloud_sync_flag(true).unwrap();
        let owner = f.store.owner_id().unwrap();

        f.app.reset_local().unwrap();

        assert_eq!(f.app.program.len(), 10);
        assert!(!f.app.settings.enable_cloud_sync);
        assert!(!f.store.cloud_sync_flag());
        assert_eq!(f.store.owner_id().unwrap(), owner, "identity survives a reset");
    }

    #[test]
    fn test_share_link_uses_owner_id() {
        let f = fixture();
        let owner = f.store.owner_id().unwrap();

        let link = f.app.share_link().unwrap();

        assert!(link.contains(&owner));
        assert_eq!(
            crate::identity::owner_id_from_link(&link).unwrap(),
            owner
        );
    }

    #[test]
    fn test_notices_are_bounded() {
        let mut f = fixture();
        for i in 0..250 {
            f.app.notify_info(format!("notice {}", i));
        }

        assert_eq!(f.app.notices.len(), MAX_NOTICES);
        assert!(f.app.notices.back().unwrap().message.contains("249"));
    }
}
