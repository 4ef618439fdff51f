//! Operations that bring the shadow calendar in line with its source.

mod diff_kind;
mod shadow_diff;

pub use diff_kind::DiffKind;
pub use shadow_diff::{DeleteReason, ShadowDiff};
