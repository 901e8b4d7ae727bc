//! Utility modules for common functionality
//!
//! Run logging and terminal progress reporting.

pub mod logger;
pub mod progress;
