use anyhow::Result;
use owo_colors::OwoColorize;
use shadowcal_core::state::SyncState;

pub fn run() -> Result<()> {
    let (_, store) = super::load()?;

    SyncState::default().save(&store)?;

    println!(
        "{} Cleared sync state in {}",
        "done".green(),
        store.path().display()
    );
    Ok(())
}
