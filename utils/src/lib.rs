//! Shared utilities for dave.

pub mod count;
pub mod time;

pub use count::format_count;
pub use time::{format_duration, format_size};
