//! Salesforce OAuth 2.0 relay: terminate the authorization-code redirect, exchange codes for
//! tokens, and refresh stored credentials through a pair of small HTTP endpoints.
//!
//! The [`server`] module exposes `/callback` and `/refresh-token`; [`flows::Relay`] does the
//! work behind them and can be embedded directly.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod instance;
pub mod oauth;
pub mod obs;
pub mod server;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::Config,
		flows::Relay,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		store::{MemorySecretStore, SecretStore},
	};

	/// Relay type alias used by reqwest-backed integration tests.
	pub type ReqwestTestRelay = Relay<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client identifier baked into [`test_config`].
	pub const TEST_CLIENT_ID: &str = "client-relay-test";
	/// Client secret baked into [`test_config`].
	pub const TEST_CLIENT_SECRET: &str = "secret-relay-test";
	/// Redirect URI baked into [`test_config`].
	pub const TEST_REDIRECT_URI: &str = "https://app.example.com/callback";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Returns a configuration with client credentials and a redirect URI but no secret store.
	pub fn test_config() -> Config {
		Config {
			salesforce_client_id: Some(TEST_CLIENT_ID.into()),
			salesforce_client_secret: Some(TEST_CLIENT_SECRET.into()),
			salesforce_redirect_uri: Some(TEST_REDIRECT_URI.into()),
			..Config::default()
		}
	}

	/// Constructs a [`Relay`] backed by an in-memory secret store and the reqwest transport
	/// used across integration tests.
	pub fn build_reqwest_test_relay(config: Config) -> (ReqwestTestRelay, Arc<MemorySecretStore>) {
		let store_backend = Arc::new(MemorySecretStore::default());
		let store: Arc<dyn SecretStore> = store_backend.clone();
		let relay = Relay::with_http_client(
			config,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_store(store);

		(relay, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
use color_eyre as _;
#[cfg(test)] use {http_body_util as _, httpmock as _, tower as _};
