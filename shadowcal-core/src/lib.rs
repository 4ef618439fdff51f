//! Core types and engine for shadowcal.
//!
//! This crate mirrors events from a source calendar onto a shadow calendar:
//! - `event` holds the provider-neutral event model
//! - `reconcile` and `scan` compute create/update/delete operations
//! - `coordinator` drives a full or incremental pass through a `CalendarBackend`
//! - `remote` talks to provider binaries over the JSON stdin/stdout protocol

pub mod backend;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod event;
pub mod fetch;
pub mod filter;
pub mod gateway;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod scan;
pub mod shadow;
pub mod state;

#[cfg(test)]
mod testing;

pub use event::*;
