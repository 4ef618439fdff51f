//! shadowcal-provider-google - Google Calendar provider for shadowcal
//!
//! This binary implements the shadowcal provider protocol, communicating
//! with shadowcal via JSON over stdin/stdout.
//!
//! The provider manages its own credentials and tokens:
//!   ~/.config/shadowcal/providers/google/app_config.toml
//!   ~/.config/shadowcal/providers/google/session/{account}.toml

mod api;
mod app_config;
mod commands;
mod convert;
mod remote_config;
mod session;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use shadowcal_core::backend::{BackendError, BackendErrorKind};
use shadowcal_core::remote::protocol::{Command, Request, Response};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(request).await,
            Err(e) => Response::<()>::error(
                &format!("Failed to parse request: {}", e),
                BackendErrorKind::Fatal,
            ),
        };

        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }

    Ok(())
}

async fn handle_request(request: Request) -> String {
    debug!(command = ?request.command, "Handling request");

    let params = request.params;
    let result = match request.command {
        Command::GetCalendar => commands::get_calendar::handle(params).await,
        Command::ListEvents => commands::list_events::handle(params).await,
        Command::InsertEvent => commands::insert_event::handle(params).await,
        Command::PatchEvent => commands::patch_event::handle(params).await,
        Command::DeleteEvent => commands::delete_event::handle(params).await,
    };

    match result {
        Ok(data) => Response::success(data),
        Err(e) => Response::<()>::error(&format!("{:#}", e), error_kind(&e)),
    }
}

/// The kind of the first backend error in the chain; anything else
/// (bad params, missing credentials) is fatal.
fn error_kind(err: &anyhow::Error) -> BackendErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BackendError>())
        .map(|e| e.kind)
        .unwrap_or(BackendErrorKind::Fatal)
}
