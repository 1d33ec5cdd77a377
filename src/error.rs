//! Relay-level error types shared across flows, the token facade, and stores.

// self
use crate::{_prelude::*, oauth::GrantType};

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
///
/// Every variant is translated into a structured JSON body at the HTTP boundary; see
/// [`crate::server::Failure`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Required configuration is missing or invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The provider redirected back with an OAuth error instead of a code.
	#[error("OAuth error: {0}")]
	Authorization(ProviderError),
	/// The token endpoint call failed.
	#[error(transparent)]
	TokenEndpoint(#[from] TokenEndpointError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Secret-store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),

	/// The incoming request is missing data or cannot be parsed.
	#[error("{reason}")]
	MalformedRequest {
		/// Human-readable reason forwarded to the caller.
		reason: String,
	},
	/// The secret store holds no credential set for the requested key.
	#[error("No stored credentials found for user `{user_id}`.")]
	CredentialsNotFound {
		/// Key that was looked up.
		user_id: String,
	},
}
impl Error {
	/// Shorthand for [`Error::MalformedRequest`].
	pub fn malformed(reason: impl Into<String>) -> Self {
		Self::MalformedRequest { reason: reason.into() }
	}
}
impl From<crate::auth::IdentifierError> for Error {
	fn from(e: crate::auth::IdentifierError) -> Self {
		Self::malformed(e.to_string())
	}
}

/// OAuth `error`/`error_description` pair reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
	/// OAuth error code, e.g. `invalid_grant` or `access_denied`.
	pub error: String,
	/// Optional human-readable description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
}
impl ProviderError {
	/// Error code used when the provider answers with a body that is not an OAuth error.
	pub const UNKNOWN: &'static str = "unknown_error";

	/// Creates a provider error from its parts.
	pub fn new(error: impl Into<String>, error_description: Option<String>) -> Self {
		Self { error: error.into(), error_description }
	}

	/// Wraps a raw, non-JSON response body into the OAuth error shape.
	pub fn raw(body: impl Into<String>) -> Self {
		Self::new(Self::UNKNOWN, Some(body.into()))
	}
}
impl Display for ProviderError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.error_description {
			Some(description) => write!(f, "{} - {description}", self.error),
			None => f.write_str(&self.error),
		}
	}
}

/// Configuration and validation failures raised by the relay.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Environment could not be deserialized into [`crate::config::Config`].
	#[error("Environment configuration is invalid: {0}.")]
	Environment(#[from] envy::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Client identifier or secret is not configured.
	#[error(
		"SALESFORCE_CLIENT_ID and SALESFORCE_CLIENT_SECRET environment variables are required for the {grant} grant."
	)]
	MissingClientCredentials {
		/// Grant that needed the credentials.
		grant: GrantType,
	},
	/// Redirect URI is not configured.
	#[error("SALESFORCE_REDIRECT_URI environment variable is required for the authorization code grant.")]
	MissingRedirectUri,
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Secret store connection settings are not configured.
	#[error("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY environment variables are required for store-backed refreshes.")]
	MissingSecretStore,
	/// Secret store URL cannot be parsed.
	#[error("Secret store URL is invalid.")]
	InvalidSecretStoreUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures. None of them are retried.
#[derive(Debug, ThisError)]
pub enum TokenEndpointError {
	/// Provider answered with a non-success status.
	#[error("Token endpoint rejected the {grant} grant: {error}.")]
	Rejected {
		/// Grant that was rejected.
		grant: GrantType,
		/// Provider error, either parsed from the body or synthesized from its raw text.
		error: ProviderError,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint answered successfully with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned an empty access token.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
	/// Provider returned an unexpected response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Unexpected {
		/// Relay-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TokenEndpointError {
	/// Projects the failure onto the OAuth `error`/`error_description` shape.
	pub fn provider_error(&self) -> ProviderError {
		match self {
			Self::Rejected { error, .. } => error.clone(),
			other => ProviderError::new(ProviderError::UNKNOWN, Some(other.to_string())),
		}
	}

	/// Returns the HTTP status reported by the token endpoint, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::ResponseParse { status, .. }
			| Self::Unexpected { status, .. } => *status,
			Self::EmptyAccessToken => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Remote the request was addressed to.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete before the configured timeout.
	#[error("Request timed out while calling {target}.")]
	Timeout {
		/// Remote the request was addressed to.
		target: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error raised against the token endpoint.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target: "the token endpoint", source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::Timeout { target: "the token endpoint" }
		} else {
			Self::network(e)
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn provider_error_display_joins_code_and_description() {
		let described = ProviderError::new("access_denied", Some("user declined".into()));
		let bare = ProviderError::new("invalid_request", None);

		assert_eq!(described.to_string(), "access_denied - user declined");
		assert_eq!(bare.to_string(), "invalid_request");
		assert_eq!(Error::Authorization(described).to_string(), "OAuth error: access_denied - user declined");
	}

	#[test]
	fn raw_bodies_become_unknown_errors() {
		let error = ProviderError::raw("<html>Bad Gateway</html>");

		assert_eq!(error.error, "unknown_error");
		assert_eq!(error.error_description.as_deref(), Some("<html>Bad Gateway</html>"));
	}

	#[test]
	fn non_rejection_failures_project_onto_unknown_error() {
		let err = TokenEndpointError::Unexpected {
			message: "server returned empty error response".into(),
			status: Some(502),
		};
		let projected = err.provider_error();

		assert_eq!(projected.error, ProviderError::UNKNOWN);
		assert_eq!(err.status(), Some(502));
		assert!(projected.to_string().contains("empty error response"));
	}

	#[test]
	fn provider_error_omits_absent_description() {
		let payload = serde_json::to_value(ProviderError::new("invalid_grant", None))
			.expect("Provider error should serialize.");

		assert_eq!(payload, serde_json::json!({ "error": "invalid_grant" }));
	}
}
