use anyhow::{Context, Result};
use shadowcal_core::remote::protocol::PatchEvent;

use super::authed_client;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let cmd: PatchEvent = serde_json::from_value(params)?;
    let client = authed_client(&cmd.remote_config).await?;

    let event = client
        .patch_event(&cmd.calendar_id, &cmd.event_id, &cmd.payload, cmd.notify)
        .await
        .with_context(|| format!("Failed to update event: {}", cmd.event_id))?;

    Ok(serde_json::to_value(event)?)
}
