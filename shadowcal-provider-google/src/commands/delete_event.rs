use anyhow::{Context, Result};
use shadowcal_core::remote::protocol::DeleteEvent;

use super::authed_client;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let cmd: DeleteEvent = serde_json::from_value(params)?;
    let client = authed_client(&cmd.remote_config).await?;

    client
        .delete_event(&cmd.calendar_id, &cmd.event_id, cmd.notify)
        .await
        .with_context(|| format!("Failed to delete event: {}", cmd.event_id))?;

    Ok(serde_json::Value::Null)
}
