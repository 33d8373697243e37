//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	/// User backed out. Swallowed silently at top-level workflows, never shown as an error.
	#[error("operation cancelled")]
	Cancelled,
	/// Remote metadata lookup failed. Recoverable, callers continue with fallback data.
	#[error("remote fetch failed: {0}")]
	RemoteFetch(String),
	#[error("revision slug mismatch: expected {expected}, got {got}")]
	SlugMismatch { expected: String, got: String },
	/// A referenced file does not exist on the server.
	#[error("file not found on server: {0}")]
	FileNotFound(String),
	/// The server rejected the request parameters.
	#[error("parameters rejected by server: {0}")]
	Rejected(String),
	/// The archive is already present in the download store.
	#[error("already downloaded as {0}")]
	AlreadyDownloaded(crate::bundle::ArchiveId),
	/// A bundle session is already active and not finished.
	#[error("another bundle session is already active")]
	SessionActive,
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("bincode error: {0}")]
	Bincode(#[from] bincode::Error),
	#[error("{0}")]
	Other(String),
}

impl Error {
	/// Whether this error represents a user-initiated cancellation rather than a failure.
	pub fn is_cancellation(&self) -> bool {
		matches!(self, Error::Cancelled)
	}
}
