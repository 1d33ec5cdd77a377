//! Storage contracts and built-in secret store implementations for credential sets.

pub mod memory;
pub mod remote;

pub use memory::MemorySecretStore;
pub use remote::RemoteSecretStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SecretStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key/value secret store holding credential sets as JSON documents.
///
/// Keys are caller-supplied user identifiers. Writes replace any previous value for the
/// key; there is no compare-and-swap, so callers serialize concurrent refreshes themselves.
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Fetches the document stored under `key`, if any.
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<JsonValue>>;

	/// Stores `value` under `key`, replacing any previous document.
	fn write<'a>(&'a self, key: &'a str, value: JsonValue) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`SecretStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored document could not be decoded or encoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Shorthand for [`StoreError::Backend`].
	pub fn backend(message: impl Into<String>) -> Self {
		Self::Backend { message: message.into() }
	}

	/// Shorthand for [`StoreError::Serialization`].
	pub fn serialization(message: impl Into<String>) -> Self {
		Self::Serialization { message: message.into() }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_relay_error_with_source() {
		let store_error = StoreError::backend("vault unreachable");
		let relay_error: Error = store_error.clone().into();

		assert!(matches!(relay_error, Error::Storage(_)));
		assert!(relay_error.to_string().contains("vault unreachable"));

		let source = StdError::source(&relay_error)
			.expect("Relay error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
