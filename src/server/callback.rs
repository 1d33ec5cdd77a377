//! `/callback` handlers.

// crates.io
use axum::{
	body::Bytes,
	extract::{Query, State, rejection::QueryRejection},
	http::{HeaderMap, header::REFERER},
	response::Response,
};
// self
use crate::{
	_prelude::*,
	auth::TokenCredentials,
	flows::{AuthorizationOutcome, CallbackEnvelope, CallbackParams, CallbackRequest, ReqwestRelay},
	server::{Endpoint, Outcome, respond},
};

/// Success body: the credential set plus the round-tripped `state`.
#[derive(Debug, Serialize)]
pub struct CallbackBody {
	#[serde(flatten)]
	credentials: TokenCredentials,
	#[serde(skip_serializing_if = "Option::is_none")]
	state: Option<String>,
}
impl From<AuthorizationOutcome> for CallbackBody {
	fn from(outcome: AuthorizationOutcome) -> Self {
		Self { credentials: outcome.credentials, state: outcome.state }
	}
}

pub(crate) async fn get(
	State(relay): State<Arc<ReqwestRelay>>,
	headers: HeaderMap,
	query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
	let request = query
		.map(|Query(params)| CallbackRequest::from_query(params, referer(&headers)))
		.map_err(|e| Error::malformed(format!("Invalid callback query: {e}")));

	complete(&relay, request).await
}

pub(crate) async fn post(State(relay): State<Arc<ReqwestRelay>>, body: Bytes) -> Response {
	let de = &mut serde_json::Deserializer::from_slice(&body);
	let request = serde_path_to_error::deserialize::<_, Vec<CallbackEnvelope>>(de)
		.map_err(|e| Error::malformed(format!("Invalid JSON in request: {e}")))
		.and_then(CallbackRequest::from_envelopes);

	complete(&relay, request).await
}

async fn complete(relay: &ReqwestRelay, request: Result<CallbackRequest>) -> Response {
	let result = match request {
		Ok(request) => relay.complete_authorization(request).await.map(CallbackBody::from),
		Err(e) => Err(e),
	};

	respond(Outcome::from_result(Endpoint::Callback, result))
}

fn referer(headers: &HeaderMap) -> Option<String> {
	headers.get(REFERER).and_then(|value| value.to_str().ok()).map(ToOwned::to_owned)
}
