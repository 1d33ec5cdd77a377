//! Wire shaping for relay results.
//!
//! Handlers produce an [`Outcome`]; only [`IntoResponse`] turns it into the JSON body.
//! Every body carries `success`, and optional fields are omitted rather than `null`.

// crates.io
use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, error::ProviderError};

/// Endpoint a failure is reported from; selects the error codes and detail prefixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
	/// `/callback`.
	Callback,
	/// `/refresh-token`.
	Refresh,
}
impl Endpoint {
	/// Error code for a failed token endpoint call.
	pub const fn exchange_code(self) -> &'static str {
		match self {
			Endpoint::Callback => "token_exchange_failed",
			Endpoint::Refresh => "token_refresh_failed",
		}
	}

	/// Prefix of `details` for a failed token endpoint call.
	pub const fn exchange_details(self) -> &'static str {
		match self {
			Endpoint::Callback => "Failed to exchange authorization code",
			Endpoint::Refresh => "Failed to refresh access token",
		}
	}

	/// Error code for malformed requests and unexpected failures.
	pub const fn processing_code(self) -> &'static str {
		match self {
			Endpoint::Callback => "callback_processing_failed",
			Endpoint::Refresh => "request_processing_failed",
		}
	}
}

/// Result of a handler before serialization.
#[derive(Debug)]
pub enum Outcome<T> {
	/// 200 with the payload's fields next to `success: true`.
	Success(T),
	/// Error body with `success: false`.
	Failure(Failure),
}
impl<T> Outcome<T> {
	/// Converts a flow result, classifying errors for `endpoint`.
	pub fn from_result(endpoint: Endpoint, result: Result<T>) -> Self {
		match result {
			Ok(value) => Self::Success(value),
			Err(e) => Self::Failure(Failure::from_error(endpoint, &e)),
		}
	}
}
impl<T> IntoResponse for Outcome<T>
where
	T: Serialize,
{
	fn into_response(self) -> Response {
		match self {
			Outcome::Success(body) =>
				(StatusCode::OK, Json(SuccessBody { success: true, body })).into_response(),
			Outcome::Failure(failure) => failure.into_response(),
		}
	}
}

/// Classified failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
	/// HTTP status.
	pub status: StatusCode,
	/// Machine-readable code.
	pub error: String,
	/// Provider or relay description.
	pub error_description: Option<String>,
	/// Human-readable detail.
	pub details: Option<String>,
}
impl Failure {
	/// Maps a relay error onto the wire taxonomy.
	pub fn from_error(endpoint: Endpoint, err: &Error) -> Self {
		match err {
			Error::Authorization(provider) => Self {
				status: StatusCode::BAD_REQUEST,
				error: provider.error.clone(),
				error_description: provider.error_description.clone(),
				details: Some(err.to_string()),
			},
			Error::TokenEndpoint(e) => Self::exchange(endpoint, e.provider_error(), err),
			Error::Transport(_) => Self::exchange(
				endpoint,
				ProviderError::new(ProviderError::UNKNOWN, Some(err.to_string())),
				err,
			),
			Error::CredentialsNotFound { .. } => Self {
				status: StatusCode::BAD_REQUEST,
				error: "credentials_not_found".into(),
				error_description: None,
				details: Some(err.to_string()),
			},
			Error::Config(_) => Self {
				status: StatusCode::INTERNAL_SERVER_ERROR,
				error: "configuration_error".into(),
				error_description: None,
				details: Some(err.to_string()),
			},
			Error::MalformedRequest { .. } | Error::Storage(_) => Self::processing(endpoint, err.to_string()),
		}
	}

	/// 500 processing failure carrying `details`.
	pub fn processing(endpoint: Endpoint, details: impl Into<String>) -> Self {
		Self {
			status: StatusCode::INTERNAL_SERVER_ERROR,
			error: endpoint.processing_code().into(),
			error_description: None,
			details: Some(details.into()),
		}
	}

	fn exchange(endpoint: Endpoint, provider: ProviderError, err: &Error) -> Self {
		Self {
			status: StatusCode::BAD_REQUEST,
			error: endpoint.exchange_code().into(),
			error_description: Some(provider.to_string()),
			details: Some(format!("{}: {err}", endpoint.exchange_details())),
		}
	}
}
impl IntoResponse for Failure {
	fn into_response(self) -> Response {
		let body = FailureBody {
			success: false,
			error: self.error,
			error_description: self.error_description,
			details: self.details,
		};

		(self.status, Json(body)).into_response()
	}
}

#[derive(Serialize)]
struct SuccessBody<T> {
	success: bool,
	#[serde(flatten)]
	body: T,
}

#[derive(Serialize)]
struct FailureBody {
	success: bool,
	error: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	error_description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	details: Option<String>,
}
