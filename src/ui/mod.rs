//! Terminal output for the shelf CLI
//!
//! Uses `cliclack` for prompts and status lines when attached to a
//! terminal, and falls back to plain bracketed lines in pipes and CI.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{step_ok, step_ok_detail, step_warn_hint};
pub use prompts::confirm;
