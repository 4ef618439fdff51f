//! Creates a valid Google session (access token) that we can use to call the gcal API

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shadowcal_core::backend::{BackendError, BackendErrorKind};
use tracing::debug;

use crate::app_config::{AppConfig, base_dir};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

pub struct Session {
    account_email: String,
    data: SessionData,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct SessionData {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl Session {
    fn path_for_account_email(account_email: &str) -> Result<PathBuf> {
        let email_slug = account_email.replace(['/', '\\', ':'], "_");

        Ok(base_dir()?
            .join("session")
            .join(format!("{}.toml", email_slug)))
    }

    fn path(&self) -> Result<PathBuf> {
        Self::path_for_account_email(&self.account_email)
    }

    pub fn access_token(&self) -> &str {
        &self.data.access_token
    }

    /// Load a session and refresh it if expired.
    pub async fn load_valid(account_email: &str) -> Result<Self> {
        let mut session = Self::load(account_email)?;

        if session.is_expired() {
            session.refresh().await?;
        }

        Ok(session)
    }

    fn load(account_email: &str) -> Result<Self> {
        let path = Self::path_for_account_email(account_email)?;

        if !path.exists() {
            anyhow::bail!(
                "Google OAuth session for {} not found at {}",
                account_email,
                path.display()
            );
        }

        let contents = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read Google OAuth session from {}",
                path.display()
            )
        })?;

        let data: SessionData = toml::from_str(&contents).with_context(|| {
            format!(
                "Failed to parse Google OAuth session from {}",
                path.display()
            )
        })?;

        Ok(Session {
            account_email: account_email.to_string(),
            data,
        })
    }

    fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(&self.data).context("Failed to serialize session")?;

        let path = self.path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write session to {}", path.display()))?;

        // Owner-only, the file holds OAuth tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.data.expires_at
    }

    async fn refresh(&mut self) -> Result<()> {
        debug!(account = %self.account_email, "Refreshing Google access token");
        let app_config = AppConfig::load()?;

        let refreshed = request_refresh(TOKEN_URL, &app_config, &self.data.refresh_token).await?;

        self.apply_refresh(refreshed, Utc::now());
        self.save()
    }

    fn apply_refresh(&mut self, refreshed: RefreshResponse, now: DateTime<Utc>) {
        self.data.access_token = refreshed.access_token;
        self.data.expires_at = now + Duration::seconds(refreshed.expires_in);
        // Google usually keeps the existing refresh token
        if let Some(refresh_token) = refreshed.refresh_token.filter(|t| !t.is_empty()) {
            self.data.refresh_token = refresh_token;
        }
    }
}

/// Exchange a refresh token at `token_url`.
///
/// Network failures and server errors come back as retryable
/// `BackendError`s, so a token endpoint hiccup does not fail the whole sync.
async fn request_refresh(
    token_url: &str,
    app_config: &AppConfig,
    refresh_token: &str,
) -> Result<RefreshResponse> {
    let response = reqwest::Client::new()
        .post(token_url)
        .form(&[
            ("client_id", app_config.client_id.as_str()),
            ("client_secret", app_config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| {
            BackendError::transient(format!("Failed to send token refresh request: {}", e))
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(refresh_failure(status, &error_text).into());
    }

    response
        .json()
        .await
        .context("Failed to parse token refresh response")
}

fn refresh_failure(status: StatusCode, body: &str) -> BackendError {
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => BackendErrorKind::RateLimited,
        s if s.is_server_error() => BackendErrorKind::Transient,
        // invalid_grant and friends need the user to sign in again
        _ => BackendErrorKind::Fatal,
    };
    BackendError::new(
        kind,
        format!("Failed to refresh Google access token ({}): {}", status, body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            account_email: "me@example.com".to_string(),
            data: SessionData {
                access_token: "old-access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_at,
            },
        }
    }

    #[test]
    fn expiring_soon_counts_as_expired() {
        assert!(session(Utc::now() + Duration::seconds(10)).is_expired());
        assert!(!session(Utc::now() + Duration::hours(1)).is_expired());
    }

    #[test]
    fn refresh_keeps_refresh_token_when_none_returned() {
        let now = Utc::now();
        let mut session = session(now);

        session.apply_refresh(
            RefreshResponse {
                access_token: "new-access".to_string(),
                expires_in: 3599,
                refresh_token: None,
            },
            now,
        );

        assert_eq!(session.access_token(), "new-access");
        assert_eq!(session.data.refresh_token, "refresh");
        assert_eq!(session.data.expires_at, now + Duration::seconds(3599));
    }

    #[test]
    fn token_endpoint_outage_is_retryable() {
        let unavailable = refresh_failure(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(unavailable.kind, BackendErrorKind::Transient);
        assert!(unavailable.kind.is_retryable());

        let throttled = refresh_failure(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(throttled.kind, BackendErrorKind::RateLimited);
    }

    #[test]
    fn revoked_refresh_token_is_fatal() {
        let err = refresh_failure(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#);

        assert_eq!(err.kind, BackendErrorKind::Fatal);
        assert!(err.message.contains("invalid_grant"));
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_transient() {
        let app_config = AppConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };

        // Nothing listens on port 1
        let err = request_refresh("http://127.0.0.1:1/token", &app_config, "refresh")
            .await
            .err()
            .unwrap();

        let backend = err.downcast_ref::<BackendError>().unwrap();
        assert_eq!(backend.kind, BackendErrorKind::Transient);
    }
}
