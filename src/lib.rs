//! DWD Fetcher Library
//!
//! A Rust library for downloading numerical weather prediction output of the
//! DWD ICON model family from the open data server. Resolves the latest model
//! run, expands field selections into individual files and fetches them
//! concurrently with rate limiting, retries and atomic writes.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
