//! Headless client for the wedding emcee assistant: local-first storage
//! for the ceremony program, settings, preset music, and trim points,
//! kept in sync with an optional cloud server across devices.

pub mod app;
pub mod batch;
pub mod config;
pub mod identity;
pub mod music_db;
pub mod presets;
pub mod program;
pub mod remote;
pub mod settings;
pub mod store;
pub mod sync;
