use anyhow::Result;
use shadowcal_core::remote::protocol::GetCalendar;

use super::authed_client;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let cmd: GetCalendar = serde_json::from_value(params)?;
    let client = authed_client(&cmd.remote_config).await?;

    let calendar = client.get_calendar(&cmd.calendar_id).await?;

    Ok(serde_json::to_value(calendar)?)
}
