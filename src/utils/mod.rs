pub mod format;
pub mod logging;

pub use format::{format_category, truncate_text};
