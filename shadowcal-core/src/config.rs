//! Configuration for shadowcal.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::PRIMARY_CALENDAR_ALIAS;
use crate::error::{ShadowError, ShadowResult};

static DEFAULT_PROVIDER: &str = "google";
static DEFAULT_STATE_PATH: &str = "~/.config/shadowcal/state.toml";

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

/// Provider-specific parameters, passed through to the provider verbatim
/// (e.g. `google_account`).
pub type RemoteConfig = serde_json::Map<String, serde_json::Value>;

/// Configuration at ~/.config/shadowcal/config.toml
///
/// Every key can be overridden with a `SHADOWCAL_`-prefixed environment
/// variable, e.g. `SHADOWCAL_ACCEPTED_ONLY=true`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShadowcalConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Guests invited to every shadow event
    #[serde(default)]
    pub attendee_emails: Vec<String>,

    /// Calendar to mirror from; empty means the account's primary calendar
    #[serde(default)]
    pub main_calendar_id: String,

    /// Calendar to mirror onto; may also come from persisted sync state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_calendar_id: Option<String>,

    #[serde(default)]
    pub show_full_details: bool,

    #[serde(default)]
    pub accepted_only: bool,

    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    #[serde(default)]
    pub remote: RemoteConfig,
}

impl ShadowcalConfig {
    pub fn config_path() -> ShadowResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ShadowError::Config("Could not determine config directory".into()))?
            .join("shadowcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file, creating a commented default on first run.
    pub fn load() -> ShadowResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> ShadowResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("SHADOWCAL")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("attendee_emails"),
            )
            .build()
            .map_err(|e| ShadowError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ShadowError::Config(e.to_string()))
    }

    /// Where the sync state lives, with `~` expanded.
    pub fn state_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.state_path.to_string_lossy()).into_owned();
        PathBuf::from(full_path_str)
    }

    /// The immutable slice of configuration the sync engine needs.
    pub fn mirror(&self) -> MirrorConfig {
        MirrorConfig {
            attendee_emails: self
                .attendee_emails
                .iter()
                .map(|e| normalize_email(e))
                .filter(|e| !e.is_empty())
                .collect(),
            main_calendar_id: self.main_calendar_id.trim().to_string(),
            show_full_details: self.show_full_details,
            accepted_only: self.accepted_only,
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> ShadowResult<()> {
        let contents = format!(
            "\
# shadowcal configuration

# Provider binary to use (shadowcal-provider-<name>):
# provider = \"{DEFAULT_PROVIDER}\"

# Guests invited to every shadow event:
# attendee_emails = [\"assistant@example.com\"]

# Calendar to mirror from (empty means your primary calendar):
# main_calendar_id = \"\"

# Calendar the shadow events are written to:
# shadow_calendar_id = \"abc123@group.calendar.google.com\"

# Copy titles and descriptions instead of showing \"Busy\":
# show_full_details = false

# Only mirror events you have accepted:
# accepted_only = false

# Where the sync token and shadow calendar id are kept:
# state_path = \"{DEFAULT_STATE_PATH}\"

# Provider-specific settings:
# [remote]
# google_account = \"me@example.com\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShadowError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ShadowError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

/// Static configuration for a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Fixed guest list for every shadow event, lowercased
    pub attendee_emails: BTreeSet<String>,
    /// Source calendar; empty resolves to the primary calendar
    pub main_calendar_id: String,
    /// Copy summary/description from the source instead of placeholders
    pub show_full_details: bool,
    /// Only mirror events the owner has accepted
    pub accepted_only: bool,
}

impl MirrorConfig {
    pub fn main_calendar(&self) -> &str {
        if self.main_calendar_id.is_empty() {
            PRIMARY_CALENDAR_ALIAS
        } else {
            &self.main_calendar_id
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
