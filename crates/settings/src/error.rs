//! Error types for reading and writing settings files.

use thiserror::Error;

/// Errors that can occur while streaming settings to or from text.
///
/// Invalid *content* is never an error: rejected entries are reported through
/// [`LoadReport`](crate::LoadReport) and the rest of the file is still applied.
#[derive(Debug, Error)]
pub enum Error {
	/// The underlying reader or writer failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// A line of the input was not valid UTF-8.
	#[error("line {line} is not valid UTF-8")]
	InvalidUtf8 {
		/// 1-based line number in the input.
		line: usize,
	},
}

/// Result type for settings I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
