//! Token endpoint facade built on the `oauth2` crate.
//!
//! Salesforce token responses carry extra fields (`instance_url`, `issued_at`, `id`,
//! `signature`) on top of the RFC 6749 shape; [`SalesforceTokenFields`] captures them.
//! Clients authenticate with `client_id`/`client_secret` in the form body, and every call
//! is a single attempt.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AccessToken, AuthType, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope,
	StandardRevocableToken, TokenResponse, TokenType, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse,
	},
};
use serde::{Deserializer, Serializer};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientCredentials,
	error::{ConfigError, ProviderError, TokenEndpointError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	instance::{InstanceUrl, InstanceUrlError},
};

type ConfiguredClient = Client<
	BasicErrorResponse,
	SalesforceTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// OAuth 2.0 grants issued against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization code exchange.
	AuthorizationCode,
	/// Refresh token exchange.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// `token_type` exactly as the provider spelled it (`Bearer` for Salesforce).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesforceTokenType(String);
impl SalesforceTokenType {
	/// Returns the raw token type.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl TokenType for SalesforceTokenType {}

/// Salesforce-specific fields flattened into the token response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceTokenFields {
	/// Instance the tokens are valid for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instance_url: Option<String>,
	/// Issuance timestamp in epoch milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<String>,
	/// Identity URL of the authorizing user.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Base64 HMAC over `id` and `issued_at`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
}

/// Token response shape returned by Salesforce.
///
/// Mirrors the RFC 6749 fields but keeps `token_type` verbatim; the `oauth2` standard
/// response lowercases it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SalesforceTokenResponse {
	access_token: AccessToken,
	token_type: SalesforceTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(
		default,
		rename = "scope",
		deserialize_with = "deserialize_scopes",
		serialize_with = "serialize_scopes",
		skip_serializing_if = "Option::is_none"
	)]
	scopes: Option<Vec<Scope>>,
	#[serde(flatten)]
	extra_fields: SalesforceTokenFields,
}
impl SalesforceTokenResponse {
	/// Salesforce extensions carried next to the standard fields.
	pub fn extra_fields(&self) -> &SalesforceTokenFields {
		&self.extra_fields
	}
}
impl TokenResponse for SalesforceTokenResponse {
	type TokenType = SalesforceTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &SalesforceTokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Option<Vec<Scope>>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<String>::deserialize(deserializer)?;

	Ok(raw.map(|value| value.split_whitespace().map(|scope| Scope::new(scope.to_owned())).collect()))
}

fn serialize_scopes<S>(scopes: &Option<Vec<Scope>>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match scopes {
		Some(scopes) => serializer.serialize_some(
			&scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "),
		),
		None => serializer.serialize_none(),
	}
}

/// Tokens issued by a successful token endpoint call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedTokens {
	/// New access token.
	pub access_token: TokenSecret,
	/// Token type as reported (`Bearer` for Salesforce).
	pub token_type: String,
	/// Access token lifetime in seconds, when reported.
	pub expires_in: Option<u64>,
	/// Refresh token, when (re)issued.
	pub refresh_token: Option<TokenSecret>,
	/// Space-delimited granted scopes, when reported.
	pub scope: Option<String>,
	/// Instance URL reported by the provider.
	pub instance_url: Option<String>,
	/// Issuance timestamp reported by the provider.
	pub issued_at: Option<String>,
}

/// Maps HTTP transport failures into relay [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a relay error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		tracing::debug!(%grant, error = %err, "token endpoint transport failure");

		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TokenEndpointError::Unexpected {
				message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
				status: meta_status(meta),
			}
			.into(),
			_ => TokenEndpointError::Unexpected {
				message: "HTTP client error occurred while calling the token endpoint".into(),
				status: meta_status(meta),
			}
			.into(),
		}
	}
}

/// Token endpoint client bound to one instance.
pub(crate) struct TokenFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	token_endpoint: Url,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> TokenFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Targets the My Domain token endpoint derived from `instance`.
	pub(crate) fn for_instance(
		instance: &InstanceUrl,
		credentials: &ClientCredentials,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_endpoint = instance.token_endpoint()?;
		let token_url = TokenUrl::new(token_endpoint.to_string()).map_err(|source| {
			InstanceUrlError::Invalid { value: token_endpoint.to_string(), source }
		})?;
		let oauth_client: ConfiguredClient =
			Client::new(ClientId::new(credentials.client_id.clone()))
				.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
				.set_auth_type(AuthType::RequestBody)
				.set_token_uri(token_url);

		Ok(Self { oauth_client, token_endpoint, http_client, error_mapper })
	}

	pub(crate) fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	/// `grant_type=authorization_code` with the configured redirect URI.
	pub(crate) async fn exchange_authorization_code(
		&self,
		code: &str,
		redirect_uri: &Url,
	) -> Result<IssuedTokens> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|err| {
				map_request_error(
					GrantType::AuthorizationCode,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

		map_token_response(response)
	}

	/// `grant_type=refresh_token`; no redirect URI is sent.
	pub(crate) async fn refresh_token(&self, refresh_token: &TokenSecret) -> Result<IssuedTokens> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| {
				map_request_error(
					GrantType::RefreshToken,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

		map_token_response(response)
	}
}

fn map_token_response(response: SalesforceTokenResponse) -> Result<IssuedTokens> {
	let access_token = TokenSecret::new(response.access_token().secret().to_owned());

	if access_token.is_blank() {
		return Err(TokenEndpointError::EmptyAccessToken.into());
	}

	let scope = response
		.scopes()
		.map(|scopes| scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "))
		.filter(|scope| !scope.is_empty());
	let extra = response.extra_fields();

	Ok(IssuedTokens {
		access_token,
		token_type: response.token_type().as_str().to_owned(),
		expires_in: response.expires_in().map(|lifetime| lifetime.as_secs()),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
		scope,
		instance_url: extra.instance_url.clone(),
		issued_at: extra.issued_at.clone(),
	})
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => TokenEndpointError::Rejected {
			grant,
			error: ProviderError::new(
				response.error().as_ref(),
				response.error_description().cloned(),
			),
			status: meta_status(meta_ref),
		}
		.into(),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta_ref, error),
		// A non-2xx body that is not an OAuth error document is passed through as raw text.
		RequestTokenError::Parse(source, body) =>
			if meta_ref.is_some_and(ResponseMetadata::is_success) {
				TokenEndpointError::ResponseParse { source, status: meta_status(meta_ref) }.into()
			} else {
				TokenEndpointError::Rejected {
					grant,
					error: ProviderError::raw(String::from_utf8_lossy(&body).into_owned()),
					status: meta_status(meta_ref),
				}
				.into()
			},
		RequestTokenError::Other(message) =>
			TokenEndpointError::Unexpected { message, status: meta_status(meta_ref) }.into(),
	}
}

fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	fn credentials() -> ClientCredentials {
		ClientCredentials {
			client_id: "client-id".into(),
			client_secret: TokenSecret::new("client-secret"),
		}
	}

	#[test]
	fn facade_targets_my_domain_token_endpoint() {
		let instance = InstanceUrl::parse("https://acme.develop.lightning.force.com/")
			.expect("Instance URL fixture should parse.");
		let facade = <TokenFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::for_instance(
			&instance,
			&credentials(),
			Arc::new(ReqwestHttpClient::default()),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Facade should build for a valid instance.");

		assert_eq!(
			facade.token_endpoint().as_str(),
			"https://acme.develop.my.salesforce.com/services/oauth2/token"
		);
	}

	#[test]
	fn salesforce_response_maps_extra_fields() {
		let response: SalesforceTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "00D!AQ",
			"instance_url": "https://acme.my.salesforce.com",
			"id": "https://login.salesforce.com/id/00D/005",
			"token_type": "Bearer",
			"issued_at": "1735689600000",
			"signature": "c2lnbmF0dXJl",
			"scope": "api refresh_token"
		}))
		.expect("Salesforce token response should deserialize.");
		let issued = map_token_response(response).expect("Token response should map.");

		assert_eq!(issued.access_token.expose(), "00D!AQ");
		assert_eq!(issued.token_type, "Bearer");
		assert_eq!(issued.expires_in, None);
		assert_eq!(issued.refresh_token, None);
		assert_eq!(issued.scope.as_deref(), Some("api refresh_token"));
		assert_eq!(issued.instance_url.as_deref(), Some("https://acme.my.salesforce.com"));
		assert_eq!(issued.issued_at.as_deref(), Some("1735689600000"));
	}

	#[test]
	fn blank_access_token_is_rejected() {
		let response: SalesforceTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "",
			"token_type": "Bearer"
		}))
		.expect("Token response should deserialize.");
		let err = map_token_response(response).expect_err("Blank access tokens must be rejected.");

		assert!(matches!(err, Error::TokenEndpoint(TokenEndpointError::EmptyAccessToken)));
	}
}
