pub mod reset;
pub mod status;
pub mod sync;

use anyhow::Result;
use shadowcal_core::config::ShadowcalConfig;
use shadowcal_core::state::FileStore;

/// Load the config and open the state file it points at.
pub fn load() -> Result<(ShadowcalConfig, FileStore)> {
    let config = ShadowcalConfig::load()?;
    let store = FileStore::new(config.state_path());
    Ok((config, store))
}
