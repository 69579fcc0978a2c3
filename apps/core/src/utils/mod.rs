//! Utility functions for LeetSync.

pub mod browser;

pub use browser::open_browser;
