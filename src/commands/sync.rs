use anyhow::Result;
use shadowcal_core::coordinator::SyncCoordinator;
use shadowcal_core::remote::{Provider, ProviderBackend};
use shadowcal_core::report::SyncMode;
use tracing::debug;

use crate::render::TerminalSink;

/// Run one sync pass. Returns whether the pass completed.
pub async fn run(incremental: bool) -> Result<bool> {
    let (config, store) = super::load()?;

    let provider = Provider::from_name(&config.provider);
    provider.binary_path()?;
    let backend = ProviderBackend::new(provider, config.remote.clone());

    let mut coordinator = SyncCoordinator::new(backend, store, config.mirror());
    if let Some(shadow_calendar_id) = &config.shadow_calendar_id {
        coordinator = coordinator.with_shadow_calendar(shadow_calendar_id.clone());
    }

    let mode = if incremental {
        SyncMode::Incremental
    } else {
        SyncMode::Full
    };

    debug!(provider = %config.provider, %mode, "Starting sync");
    let report = coordinator.run_and_notify(mode, &TerminalSink).await;
    Ok(report.is_success())
}
