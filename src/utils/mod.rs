//! Shared utilities.

mod encoding;

pub use encoding::force_utf8;
