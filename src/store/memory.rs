//! Thread-safe in-memory [`SecretStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{SecretStore, StoreFuture},
};

type SecretMap = Arc<RwLock<HashMap<String, JsonValue>>>;

/// Storage backend that keeps documents in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore(SecretMap);
impl MemorySecretStore {
	/// Seeds `key` synchronously; handy for fixtures.
	pub fn insert(&self, key: impl Into<String>, value: JsonValue) {
		self.0.write().insert(key.into(), value);
	}

	/// Returns a snapshot of the document under `key`.
	pub fn get(&self, key: &str) -> Option<JsonValue> {
		self.0.read().get(key).cloned()
	}
}
impl SecretStore for MemorySecretStore {
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<JsonValue>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn write<'a>(&'a self, key: &'a str, value: JsonValue) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn write_replaces_previous_document() {
		let store = MemorySecretStore::default();

		assert_eq!(store.read("u1").await.expect("Read should succeed."), None);

		store.write("u1", serde_json::json!({ "refreshToken": "r1" })).await.expect("Write should succeed.");
		store.write("u1", serde_json::json!({ "refreshToken": "r2" })).await.expect("Write should succeed.");

		assert_eq!(store.get("u1"), Some(serde_json::json!({ "refreshToken": "r2" })));
	}

	#[tokio::test]
	async fn clones_share_the_same_map() {
		let store = MemorySecretStore::default();
		let clone = store.clone();

		clone.insert("u1", serde_json::json!({ "instanceUrl": "https://x.my.salesforce.com/" }));

		assert!(store.read("u1").await.expect("Read should succeed.").is_some());
		assert_eq!(store.read("u2").await.expect("Read should succeed."), None);
	}
}
