//! Relay orchestration: callback code exchange and credential refresh.

pub mod auth_code;
pub mod common;
pub mod refresh;

pub use auth_code::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	config::Config,
	error::ConfigError,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	store::SecretStore,
};

/// Relay specialized for the crate's default reqwest transport stack.
pub type ReqwestRelay = Relay<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates the Salesforce token flows.
///
/// The relay owns the HTTP client, immutable configuration, and optional secret store so the
/// callback and refresh flows can focus on grant-specific logic. Store-backed refreshes for
/// the same user are serialized through per-key guards.
#[derive(Clone)]
pub struct Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Configuration loaded at startup.
	pub config: Arc<Config>,
	/// Secret store used by store-backed refreshes, when configured.
	pub store: Option<Arc<dyn SecretStore>>,
	flow_guards: common::FlowGuards,
}
impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a relay that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: impl Into<Arc<Config>>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config: config.into(),
			store: None,
			flow_guards: Default::default(),
		}
	}

	/// Attaches or replaces the secret store.
	pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
		self.store = Some(store);

		self
	}

	pub(crate) fn secret_store(&self) -> Result<&Arc<dyn SecretStore>> {
		self.store.as_ref().ok_or_else(|| ConfigError::MissingSecretStore.into())
	}
}
impl ReqwestRelay {
	/// Builds the relay the binary serves: a reqwest transport honoring the configured
	/// timeout, plus the remote secret store when its settings are present.
	pub fn from_config(config: Config) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::new(config.provider_timeout())?;
		let store = if config.has_secret_store() {
			Some(Arc::new(config.secret_store(http_client.0.clone())?) as Arc<dyn SecretStore>)
		} else {
			None
		};
		let mut relay =
			Self::with_http_client(config, http_client, Arc::new(ReqwestTransportErrorMapper));

		relay.store = store;

		Ok(relay)
	}
}
impl<C, M> Debug for Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Relay")
			.field("config", &self.config)
			.field("store_set", &self.store.is_some())
			.finish()
	}
}
