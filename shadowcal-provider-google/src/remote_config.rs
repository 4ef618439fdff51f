//! Google-specific remote configuration.
//!
//! shadowcal passes its `[remote]` table through untouched; this is the
//! part of it the Google provider understands.

use anyhow::{Context, Result};
use serde::Deserialize;
use shadowcal_core::config::RemoteConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleRemoteConfig {
    /// Account whose stored session is used for API calls
    pub google_account: String,
}

impl GoogleRemoteConfig {
    pub fn from_remote(remote: &RemoteConfig) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(remote.clone()))
            .context("Missing `google_account` in the [remote] section of the shadowcal config")
    }
}
