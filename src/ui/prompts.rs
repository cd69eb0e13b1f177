//! Confirmation prompt with a non-interactive fallback

use super::context::UiContext;
use crate::error::{ShelfError, ShelfResult};

/// Ask for confirmation; auto-yes approves, non-interactive returns `default`
pub fn confirm(ctx: &UiContext, message: &str, default: bool) -> ShelfResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    cliclack::confirm(message)
        .initial_value(default)
        .interact()
        .map_err(|e| ShelfError::User(format!("Prompt failed: {}", e)))
}
