//! Calendar access through external provider binaries.

pub mod protocol;
mod provider;

pub use provider::{Provider, ProviderBackend};
