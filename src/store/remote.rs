//! [`SecretStore`] backed by a PostgREST-style RPC vault (`read_secret` / `write_secret`).

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	store::{SecretStore, StoreError, StoreFuture},
};

const READ_RPC: &str = "rest/v1/rpc/read_secret";
const WRITE_RPC: &str = "rest/v1/rpc/write_secret";

#[derive(Serialize)]
struct ReadSecret<'a> {
	secret_key: &'a str,
}

#[derive(Serialize)]
struct WriteSecret<'a> {
	secret_key: &'a str,
	secret_value: String,
}

/// Remote vault reached over HTTP with a service-role key.
///
/// Documents are written as JSON text; reads accept either a JSON string (parsed back into a
/// document) or an inline JSON value. A `null` result means the key is absent.
#[derive(Clone)]
pub struct RemoteSecretStore {
	client: ReqwestClient,
	read_endpoint: Url,
	write_endpoint: Url,
	service_key: TokenSecret,
}
impl RemoteSecretStore {
	/// Builds a store rooted at `base_url`.
	pub fn new(
		client: ReqwestClient,
		base_url: &str,
		service_key: TokenSecret,
	) -> Result<Self, ConfigError> {
		let mut base = base_url.trim().to_owned();

		if !base.ends_with('/') {
			base.push('/');
		}

		let base = Url::parse(&base).map_err(|source| ConfigError::InvalidSecretStoreUrl { source })?;
		let read_endpoint =
			base.join(READ_RPC).map_err(|source| ConfigError::InvalidSecretStoreUrl { source })?;
		let write_endpoint =
			base.join(WRITE_RPC).map_err(|source| ConfigError::InvalidSecretStoreUrl { source })?;

		Ok(Self { client, read_endpoint, write_endpoint, service_key })
	}

	async fn call<T>(&self, endpoint: &Url, payload: &T) -> Result<reqwest::Response, StoreError>
	where
		T: ?Sized + Serialize,
	{
		let response = self
			.client
			.post(endpoint.clone())
			.header("apikey", self.service_key.expose())
			.bearer_auth(self.service_key.expose())
			.json(payload)
			.send()
			.await
			.map_err(|e| StoreError::backend(format!("secret store request failed: {e}")))?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();

			return Err(StoreError::backend(format!(
				"secret store answered {status}: {}",
				body.trim()
			)));
		}

		Ok(response)
	}
}
impl Debug for RemoteSecretStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RemoteSecretStore")
			.field("read_endpoint", &self.read_endpoint.as_str())
			.field("write_endpoint", &self.write_endpoint.as_str())
			.field("service_key", &self.service_key)
			.finish()
	}
}
impl SecretStore for RemoteSecretStore {
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<JsonValue>> {
		Box::pin(async move {
			let response = self.call(&self.read_endpoint, &ReadSecret { secret_key: key }).await?;
			let body = response
				.bytes()
				.await
				.map_err(|e| StoreError::backend(format!("secret store response was cut short: {e}")))?;

			decode_secret(&body)
		})
	}

	fn write<'a>(&'a self, key: &'a str, value: JsonValue) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let payload = WriteSecret { secret_key: key, secret_value: value.to_string() };

			self.call(&self.write_endpoint, &payload).await?;

			Ok(())
		})
	}
}

fn decode_secret(body: &[u8]) -> Result<Option<JsonValue>, StoreError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(None);
	}

	let de = &mut serde_json::Deserializer::from_slice(body);
	let value: JsonValue = serde_path_to_error::deserialize(de)
		.map_err(|e| StoreError::serialization(format!("secret store response: {e}")))?;

	match value {
		JsonValue::Null => Ok(None),
		JsonValue::String(text) => serde_json::from_str(&text)
			.map(Some)
			.map_err(|e| StoreError::serialization(format!("stored secret is not JSON: {e}"))),
		other => Ok(Some(other)),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn endpoints_are_joined_under_rest_rpc() {
		for base in ["https://vault.example.com", "https://vault.example.com/"] {
			let store =
				RemoteSecretStore::new(ReqwestClient::new(), base, TokenSecret::new("service"))
					.expect("Store should build.");

			assert_eq!(
				store.read_endpoint.as_str(),
				"https://vault.example.com/rest/v1/rpc/read_secret"
			);
			assert_eq!(
				store.write_endpoint.as_str(),
				"https://vault.example.com/rest/v1/rpc/write_secret"
			);
		}
	}

	#[test]
	fn invalid_base_url_is_a_config_error() {
		let err = RemoteSecretStore::new(ReqwestClient::new(), "vault", TokenSecret::new("k"))
			.expect_err("Relative base URLs must be rejected.");

		assert!(matches!(err, ConfigError::InvalidSecretStoreUrl { .. }));
	}

	#[test]
	fn decodes_string_inline_and_null_results() {
		assert_eq!(decode_secret(b"null").expect("null should decode."), None);
		assert_eq!(decode_secret(b"").expect("Empty bodies should decode."), None);
		assert_eq!(
			decode_secret(br#""{\"refreshToken\":\"r1\"}""#).expect("JSON text should decode."),
			Some(serde_json::json!({ "refreshToken": "r1" }))
		);
		assert_eq!(
			decode_secret(br#"{"refreshToken":"r1"}"#).expect("Inline JSON should decode."),
			Some(serde_json::json!({ "refreshToken": "r1" }))
		);
		assert!(matches!(
			decode_secret(br#""not json""#),
			Err(StoreError::Serialization { .. })
		));
	}

	#[test]
	fn debug_output_redacts_service_key() {
		let store =
			RemoteSecretStore::new(ReqwestClient::new(), "https://vault.example.com", TokenSecret::new("service-key"))
				.expect("Store should build.");

		assert!(!format!("{store:?}").contains("service-key"));
	}
}
