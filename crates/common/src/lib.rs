//! Shared error definitions and small utilities used across all switchyard crates.

pub mod error;
pub mod time;

pub use {
    error::{Error, FromMessage, Result},
    time::now_ms,
};
