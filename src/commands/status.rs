use anyhow::Result;
use owo_colors::OwoColorize;
use shadowcal_core::config::ShadowcalConfig;
use shadowcal_core::remote::Provider;
use shadowcal_core::state::SyncState;

pub fn run() -> Result<()> {
    let (config, store) = super::load()?;
    let state = SyncState::load(&store)?;
    let mirror = config.mirror();

    println!("{}", "Configuration".bold());
    println!("   config:    {}", ShadowcalConfig::config_path()?.display());

    let provider = Provider::from_name(&config.provider);
    match provider.binary_path() {
        Ok(path) => println!("   provider:  {} ({})", provider.name(), path.display().dimmed()),
        Err(e) => println!("   provider:  {}", e.to_string().red()),
    }

    println!("   main:      {}", mirror.main_calendar());
    match config.shadow_calendar_id.as_deref().or(state.shadow_calendar_id.as_deref()) {
        Some(id) => println!("   shadow:    {}", id),
        None => println!("   shadow:    {}", "not configured".red()),
    }

    if mirror.attendee_emails.is_empty() {
        println!("   guests:    {}", "none".yellow());
    } else {
        let guests: Vec<&str> = mirror.attendee_emails.iter().map(String::as_str).collect();
        println!("   guests:    {}", guests.join(", "));
    }

    println!(
        "   details:   {}",
        if mirror.show_full_details { "full" } else { "busy only" }
    );
    println!(
        "   responses: {}",
        if mirror.accepted_only {
            "accepted only"
        } else {
            "all except declined"
        }
    );

    println!();
    println!("{}", "Sync state".bold());
    println!("   file:      {}", store.path().display());
    match &state.sync_token {
        Some(_) => println!("   token:     {}", "stored (incremental sync available)".green()),
        None => println!("   token:     {}", "none (next sync scans the full window)".dimmed()),
    }

    Ok(())
}
