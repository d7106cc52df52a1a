//! HTTP implementation of the remote gateway.
//!
//! One POST endpoint takes `{action, userId, data}` and answers
//! `{success, result, message, error}`; a GET endpoint reports health.
//! The server wraps handler outcomes in `success: true` even when the
//! handler itself reports failure, so sync calls must check the inner
//! `result` boolean, not just the envelope.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{RemoteStatus, RemoteStore};
use crate::music_db::{TrimRange, TrimSettings};
use crate::presets::PresetTrack;
use crate::program::Step;
use crate::settings::Settings;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest<'a> {
    action: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct SyncResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    connected: bool,
    #[serde(default)]
    message: String,
}

pub struct HttpRemote {
    client: HttpClient,
    base_url: String,
    owner_id: String,
}

impl HttpRemote {
    pub fn new(base_url: &str, owner_id: &str, timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            owner_id: owner_id.to_string(),
        })
    }

    /// Send one action to the dispatch endpoint. Returns the `result`
    /// payload, or None after logging whatever went wrong.
    async fn dispatch(&self, action: &str, data: Option<Value>) -> Option<Value> {
        let body = SyncRequest {
            action,
            user_id: &self.owner_id,
            data,
        };
        let url = format!("{}/api/sync", self.base_url);
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<SyncResponse>().await {
                Ok(parsed) if parsed.success => Some(parsed.result),
                Ok(parsed) => {
                    let detail = parsed
                        .error
                        .or(parsed.message)
                        .unwrap_or_else(|| "no detail".to_string());
                    tracing::warn!("remote rejected {}: {}", action, detail);
                    None
                }
                Err(e) => {
                    tracing::warn!("unreadable response for {}: {}", action, e);
                    None
                }
            },
            Ok(resp) => {
                tracing::warn!("{} failed with status {}", action, resp.status());
                None
            }
            Err(e) => {
                tracing::warn!("{} request failed: {}", action, e);
                None
            }
        }
    }

    /// Dispatch a push action; true only when the handler reported
    /// success for its own work.
    async fn dispatch_ok(&self, action: &str, data: Value) -> bool {
        matches!(
            self.dispatch(action, Some(data)).await,
            Some(Value::Bool(true))
        )
    }

    fn fetch_payload<T: serde::de::DeserializeOwned>(action: &str, value: Value) -> Option<T> {
        if value.is_null() {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("malformed {} payload: {}", action, e);
                None
            }
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn check_status(&self) -> Result<RemoteStatus> {
        let url = format!("{}/api/db-status", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("health check request failed")?;
        if !resp.status().is_success() {
            bail!("health check failed with status {}", resp.status());
        }
        let status: StatusResponse = resp
            .json()
            .await
            .context("unreadable health check response")?;
        Ok(RemoteStatus {
            enabled: status.enabled,
            connected: status.connected,
            message: status.message,
        })
    }

    async fn fetch_program(&self) -> Option<Vec<Step>> {
        let result = self.dispatch("fetchProgram", None).await?;
        Self::fetch_payload("fetchProgram", result)
    }

    async fn fetch_settings(&self) -> Option<Settings> {
        let result = self.dispatch("fetchSettings", None).await?;
        Self::fetch_payload("fetchSettings", result)
    }

    async fn fetch_presets(&self) -> Option<Vec<PresetTrack>> {
        let result = self.dispatch("fetchPresets", None).await?;
        Self::fetch_payload("fetchPresets", result)
    }

    async fn fetch_trim_settings(&self) -> Vec<TrimSettings> {
        match self.dispatch("fetchTrimSettings", None).await {
            Some(result) => Self::fetch_payload("fetchTrimSettings", result).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn sync_program(&self, steps: &[Step]) -> bool {
        match serde_json::to_value(steps) {
            Ok(data) => self.dispatch_ok("syncProgram", data).await,
            Err(e) => {
                tracing::warn!("could not serialize program: {}", e);
                false
            }
        }
    }

    async fn sync_settings(&self, settings: &Settings) -> bool {
        match serde_json::to_value(settings) {
            Ok(data) => self.dispatch_ok("syncSettings", data).await,
            Err(e) => {
                tracing::warn!("could not serialize settings: {}", e);
                false
            }
        }
    }

    async fn sync_presets(&self, catalog: &[PresetTrack]) -> bool {
        match serde_json::to_value(catalog) {
            Ok(data) => self.dispatch_ok("syncPresets", data).await,
            Err(e) => {
                tracing::warn!("could not serialize preset catalog: {}", e);
                false
            }
        }
    }

    async fn sync_trim(&self, music_id: &str, range: &TrimRange, is_preset: bool) -> bool {
        let data = json!({
            "musicId": music_id,
            "settings": { "start": range.start, "end": range.end },
            "isPreset": is_preset,
        });
        self.dispatch_ok("syncTrim", data).await
    }

    async fn clear_all(&self) -> bool {
        matches!(
            self.dispatch("clearData", None).await,
            Some(Value::Bool(true))
        )
    }
}
