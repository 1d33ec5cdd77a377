//! Authorization-code callback handling.
//!
//! The provider redirects the user back with either `code` (+ `state`) or `error`
//! (+ `error_description`). [`Relay::complete_authorization`] classifies the redirect,
//! resolves the display instance URL (explicit `instance_url` first, then the referer
//! origin), and exchanges the code at that instance's My Domain token endpoint.

// self
use crate::{
	_prelude::*,
	auth::TokenCredentials,
	error::ProviderError,
	flows::{Relay, common},
	http::TokenHttpClient,
	instance::InstanceUrl,
	oauth::{GrantType, TransportErrorMapper},
	obs::FlowKind,
};

/// OAuth parameters carried by the provider redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	#[serde(default)]
	pub code: Option<String>,
	/// Opaque value round-tripped from the authorization request.
	#[serde(default)]
	pub state: Option<String>,
	/// OAuth error code.
	#[serde(default)]
	pub error: Option<String>,
	/// OAuth error description.
	#[serde(default)]
	pub error_description: Option<String>,
	/// Explicit instance URL, when the caller knows it.
	#[serde(default)]
	pub instance_url: Option<String>,
	/// Scopes the user granted, as echoed on the redirect.
	#[serde(default)]
	pub scope: Option<String>,
}
impl CallbackParams {
	/// Splits the redirect into a grant or a provider denial.
	///
	/// `error` wins whenever it is present, even alongside a `code`.
	pub fn classify(self) -> Result<CallbackGrant> {
		if let Some(error) = non_empty(self.error) {
			return Err(Error::Authorization(ProviderError::new(
				error,
				non_empty(self.error_description),
			)));
		}

		let code = non_empty(self.code).ok_or_else(|| {
			Error::malformed("Invalid OAuth callback format - missing required parameters")
		})?;

		Ok(CallbackGrant {
			code,
			state: non_empty(self.state),
			instance_url: non_empty(self.instance_url),
			scope: non_empty(self.scope),
		})
	}
}

/// Authorization code plus the values needed to complete the exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct CallbackGrant {
	/// Authorization code.
	pub code: String,
	/// Round-tripped state.
	pub state: Option<String>,
	/// Explicit instance URL.
	pub instance_url: Option<String>,
	/// Scope from the redirect; used when the token response omits one.
	pub scope: Option<String>,
}
impl Debug for CallbackGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackGrant")
			.field("code", &"<redacted>")
			.field("state", &self.state)
			.field("instance_url", &self.instance_url)
			.field("scope", &self.scope)
			.finish()
	}
}

/// One element of the JSON array posted by webhook-style forwarders.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackEnvelope {
	/// Query parameters of the original redirect.
	#[serde(default)]
	pub query: Option<CallbackParams>,
	/// Headers of the original redirect.
	#[serde(default)]
	pub headers: Option<HashMap<String, JsonValue>>,
}

/// Normalized callback input, independent of the HTTP method it arrived with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackRequest {
	/// Redirect parameters.
	pub params: CallbackParams,
	/// `Referer` of the redirect, used to infer the instance URL.
	pub referer: Option<String>,
}
impl CallbackRequest {
	/// Builds a request from GET query parameters and the request's `Referer` header.
	pub fn from_query(params: CallbackParams, referer: Option<String>) -> Self {
		Self { params, referer }
	}

	/// Builds a request from a posted envelope array; only the first element is used.
	pub fn from_envelopes(envelopes: Vec<CallbackEnvelope>) -> Result<Self> {
		let envelope = envelopes
			.into_iter()
			.next()
			.ok_or_else(|| Error::malformed("No callback data received"))?;
		let params = envelope
			.query
			.ok_or_else(|| Error::malformed("No query parameters found in callback data"))?;
		let referer = envelope.headers.as_ref().and_then(|headers| {
			headers
				.iter()
				.find(|(name, _)| name.eq_ignore_ascii_case("referer"))
				.and_then(|(_, value)| value.as_str())
				.map(ToOwned::to_owned)
		});

		Ok(Self { params, referer })
	}
}

/// Successful callback: the issued credential set and the round-tripped state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationOutcome {
	/// Issued credentials.
	pub credentials: TokenCredentials,
	/// State from the redirect.
	pub state: Option<String>,
}

impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Completes a provider redirect.
	///
	/// Provider denials surface as [`Error::Authorization`] without contacting the token
	/// endpoint.
	pub async fn complete_authorization(
		&self,
		request: CallbackRequest,
	) -> Result<AuthorizationOutcome> {
		common::observed(FlowKind::AuthorizationCode, "complete_authorization", async move {
			let CallbackRequest { params, referer } = request;
			let CallbackGrant { code, state, instance_url, scope } = params.classify()?;
			let instance = InstanceUrl::resolve(instance_url.as_deref(), referer.as_deref())?;

			tracing::info!(instance = %instance, "exchanging authorization code");

			let mut credentials = self.exchange_authorization_code(&code, &instance).await?;

			credentials.scope = credentials.scope.or(scope);

			Ok(AuthorizationOutcome { credentials, state })
		})
		.await
	}

	/// Exchanges `code` at `instance`'s token endpoint.
	///
	/// The returned set takes its instance URL from the token response when present,
	/// otherwise `instance`, and records `code` as its legacy `authCode`.
	pub async fn exchange_authorization_code(
		&self,
		code: &str,
		instance: &InstanceUrl,
	) -> Result<TokenCredentials> {
		let redirect_uri = self.config.redirect_uri()?;
		let facade = common::facade(self, GrantType::AuthorizationCode, instance)?;

		tracing::debug!(endpoint = %facade.token_endpoint(), "token endpoint resolved");

		let tokens = facade.exchange_authorization_code(code, &redirect_uri).await?;

		Ok(TokenCredentials::issued(tokens, instance.clone(), Some(code.to_owned())))
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}
