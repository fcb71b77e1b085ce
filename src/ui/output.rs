//! Status lines

use super::context::UiContext;
use console::style;

/// Section header
pub fn section(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::success(message).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::info(message).ok();
    } else {
        println!("{}", message);
    }
}

/// Warning with a follow-up suggestion
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.is_interactive() {
        cliclack::log::warning(format!("{}\n{}", message, style(hint).dim())).ok();
    } else {
        eprintln!("{} {}", style("[WARN]").yellow(), message);
        eprintln!("       {}", style(hint).dim());
    }
}

/// Aligned `key: value` line
pub fn key_value(_ctx: &UiContext, key: &str, value: &str) {
    println!("  {:<14} {}", style(format!("{}:", key)).dim(), value);
}
