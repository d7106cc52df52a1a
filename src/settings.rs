use serde::{Deserialize, Serialize};

/// User preferences synced as a single flat record.
///
/// `enable_cloud_sync` is the master switch for every remote operation;
/// the store keeps a separately persisted mirror of it so an off→on flip
/// can be detected even across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_play_music: bool,
    pub auto_start_timer: bool,
    pub enable_cloud_sync: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_play_music: true,
            auto_start_timer: true,
            enable_cloud_sync: false,
        }
    }
}
