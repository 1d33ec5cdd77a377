//! Relay configuration loaded once from the process environment.
//!
//! Values are read at startup (after an optional `.env` file) and shared immutably; flows
//! validate the pieces they need and fail fast with [`ConfigError`] instead of defaulting.

// std
use std::{
	net::{Ipv4Addr, SocketAddr},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	oauth::GrantType,
	store::RemoteSecretStore,
};

/// Environment-backed relay configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
	/// `SALESFORCE_CLIENT_ID`.
	#[serde(default)]
	pub salesforce_client_id: Option<String>,
	/// `SALESFORCE_CLIENT_SECRET`.
	#[serde(default)]
	pub salesforce_client_secret: Option<String>,
	/// `SALESFORCE_REDIRECT_URI`; only the callback flow needs it.
	#[serde(default)]
	pub salesforce_redirect_uri: Option<String>,
	/// `SUPABASE_URL`; enables store-backed refreshes.
	#[serde(default)]
	pub supabase_url: Option<String>,
	/// `SUPABASE_SERVICE_ROLE_KEY`.
	#[serde(default)]
	pub supabase_service_role_key: Option<String>,
	/// `BIND_ADDRESS`.
	#[serde(default = "default_bind_address")]
	pub bind_address: SocketAddr,
	/// `PROVIDER_TIMEOUT_SECS`.
	#[serde(default = "default_provider_timeout_secs")]
	pub provider_timeout_secs: u64,
}
impl Config {
	/// Loads `.env` (when present) and deserializes the environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();

		Ok(envy::from_env()?)
	}

	/// Client credentials sent to the token endpoint for `grant`.
	pub fn client_credentials(&self, grant: GrantType) -> Result<ClientCredentials, ConfigError> {
		match (present(&self.salesforce_client_id), present(&self.salesforce_client_secret)) {
			(Some(client_id), Some(client_secret)) => Ok(ClientCredentials {
				client_id: client_id.to_owned(),
				client_secret: TokenSecret::new(client_secret),
			}),
			_ => Err(ConfigError::MissingClientCredentials { grant }),
		}
	}

	/// Redirect URI registered with the connected app.
	pub fn redirect_uri(&self) -> Result<Url, ConfigError> {
		let raw = present(&self.salesforce_redirect_uri).ok_or(ConfigError::MissingRedirectUri)?;

		Url::parse(raw).map_err(|source| ConfigError::InvalidRedirect { source })
	}

	/// Returns `true` when both secret store settings are present.
	pub fn has_secret_store(&self) -> bool {
		present(&self.supabase_url).is_some() && present(&self.supabase_service_role_key).is_some()
	}

	/// Builds the remote secret store on top of `client`.
	pub fn secret_store(&self, client: ReqwestClient) -> Result<RemoteSecretStore, ConfigError> {
		match (present(&self.supabase_url), present(&self.supabase_service_role_key)) {
			(Some(url), Some(key)) => RemoteSecretStore::new(client, url, TokenSecret::new(key)),
			_ => Err(ConfigError::MissingSecretStore),
		}
	}

	/// Timeout applied to every outbound call.
	pub fn provider_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.provider_timeout_secs)
	}

	/// Logs a warning for every setting a flow will later reject.
	pub fn warn_missing(&self) {
		if present(&self.salesforce_client_id).is_none()
			|| present(&self.salesforce_client_secret).is_none()
		{
			tracing::warn!("SALESFORCE_CLIENT_ID/SALESFORCE_CLIENT_SECRET not set; token calls will fail");
		}
		if present(&self.salesforce_redirect_uri).is_none() {
			tracing::warn!("SALESFORCE_REDIRECT_URI not set; callbacks will fail");
		}
		if !self.has_secret_store() {
			tracing::warn!("SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY not set; store-backed refreshes are disabled");
		}
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			salesforce_client_id: None,
			salesforce_client_secret: None,
			salesforce_redirect_uri: None,
			supabase_url: None,
			supabase_service_role_key: None,
			bind_address: default_bind_address(),
			provider_timeout_secs: default_provider_timeout_secs(),
		}
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");

		f.debug_struct("Config")
			.field("salesforce_client_id", &self.salesforce_client_id)
			.field("salesforce_client_secret", &redact(&self.salesforce_client_secret))
			.field("salesforce_redirect_uri", &self.salesforce_redirect_uri)
			.field("supabase_url", &self.supabase_url)
			.field("supabase_service_role_key", &redact(&self.supabase_service_role_key))
			.field("bind_address", &self.bind_address)
			.field("provider_timeout_secs", &self.provider_timeout_secs)
			.finish()
	}
}

/// Connected-app credentials presented in the token request body.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	/// Consumer key.
	pub client_id: String,
	/// Consumer secret.
	pub client_secret: TokenSecret,
}

fn present(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn default_bind_address() -> SocketAddr {
	SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000))
}

fn default_provider_timeout_secs() -> u64 {
	30
}
