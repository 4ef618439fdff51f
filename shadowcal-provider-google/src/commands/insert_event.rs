use anyhow::{Context, Result};
use shadowcal_core::remote::protocol::InsertEvent;

use super::authed_client;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let cmd: InsertEvent = serde_json::from_value(params)?;
    let client = authed_client(&cmd.remote_config).await?;

    let event = client
        .insert_event(&cmd.calendar_id, &cmd.payload, cmd.notify)
        .await
        .with_context(|| format!("Failed to create shadow of {}", cmd.payload.origin_id))?;

    Ok(serde_json::to_value(event)?)
}
