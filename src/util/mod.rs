//! Text helpers for terminal output: sanitizing remote text, Unicode-aware
//! width calculation and column fitting.

mod text;

pub use text::{display_width, fit_column, format_rating, sanitize_line, truncate_to_width};
