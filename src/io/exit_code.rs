//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed. A query against a missing index
//!   also exits 0: the response itself reports the condition.
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the embedding model is unavailable
//! - `4-7`: Specific failures (parse, I/O, configuration, corrupt index)
//! - `126-255`: Reserved by shell

use crate::error::RetrievalError;
use crate::io::response::QueryResponse;
use crate::vector::VectorError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Failed to parse the dataset or metadata (code 4)
    ParseError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Index corruption detected (code 7)
    IndexCorrupted = 7,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Convert a `RetrievalError` to the appropriate exit code.
    pub fn from_error(error: &RetrievalError) -> Self {
        match error {
            // Reported in the response body, not the status
            RetrievalError::IndexMissing { .. } => ExitCode::Success,

            RetrievalError::DatasetNotFound { .. }
            | RetrievalError::FileRead { .. }
            | RetrievalError::FileWrite { .. } => ExitCode::IoError,
            RetrievalError::Parse { .. } => ExitCode::ParseError,
            RetrievalError::ModelLoad { .. } => ExitCode::BlockingError,
            RetrievalError::Config { .. } => ExitCode::ConfigError,

            RetrievalError::FormatMismatch { .. }
            | RetrievalError::Vector(
                VectorError::Corrupted(_) | VectorError::VersionMismatch { .. },
            ) => ExitCode::IndexCorrupted,

            RetrievalError::EmptyCorpus
            | RetrievalError::Vector(_)
            | RetrievalError::AlreadyInitialized => ExitCode::GeneralError,
        }
    }

    /// Exit code for a query response.
    ///
    /// With the originating error at hand its specific code is used;
    /// otherwise a hard failure maps to `GeneralError`.
    pub fn for_response(response: &QueryResponse, error: Option<&RetrievalError>) -> Self {
        match error {
            Some(error) => Self::from_error(error),
            None if response.is_hard_failure() => ExitCode::GeneralError,
            None => ExitCode::Success,
        }
    }
}
