//! Small helpers shared by the CLI and the poller.
//!
//! - **Feed names**: the alphanumeric-only naming rule
//! - **Text**: flattening feed text onto a single output line

mod name;
mod text;

pub use name::{validate_feed_name, NameError};
pub use text::single_line;
