//! Terminal feedback for the CLI.

pub mod progress;

pub use progress::{create_spinner, with_spinner};
