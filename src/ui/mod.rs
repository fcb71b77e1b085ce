//! Terminal output for the imgcache CLI
//!
//! Interactive terminals get `cliclack` styling and prompts; pipes and CI
//! get plain lines. Results go to stdout, progress chatter to stderr.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{key_value, section, step_info, step_ok, step_warn_hint};
pub use progress::TaskSpinner;
pub use prompts::confirm;
