//! Output handling for the CLI.
//!
//! This module provides:
//! - The query response written to stdout (JSON line or prompt context)
//! - Exit codes derived from the error taxonomy
//! - The line loop behind `serve`

pub mod exit_code;
pub mod response;
pub mod serve;

pub use exit_code::ExitCode;
pub use response::{INDEX_NOT_FOUND, QueryResponse};
pub use serve::serve_lines;
