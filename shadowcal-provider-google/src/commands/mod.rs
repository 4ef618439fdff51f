pub mod delete_event;
pub mod get_calendar;
pub mod insert_event;
pub mod list_events;
pub mod patch_event;

use anyhow::Result;
use shadowcal_core::config::RemoteConfig;

use crate::api::GoogleClient;
use crate::remote_config::GoogleRemoteConfig;
use crate::session::Session;

/// An API client authorized as the account named in the remote config.
pub async fn authed_client(remote_config: &RemoteConfig) -> Result<GoogleClient> {
    let config = GoogleRemoteConfig::from_remote(remote_config)?;
    let session = Session::load_valid(&config.google_account).await?;
    Ok(GoogleClient::new(session.access_token()))
}
