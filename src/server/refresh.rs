//! `/refresh-token` handlers.

// crates.io
use axum::{
	body::Bytes,
	extract::{Query, State, rejection::QueryRejection},
	response::Response,
};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	flows::{RefreshRequest, ReqwestRelay},
	server::{Endpoint, Outcome, respond},
};

#[derive(Debug, Deserialize)]
pub(crate) struct StoredRefreshQuery {
	#[serde(default, rename = "userId")]
	user_id: Option<String>,
}

pub(crate) async fn post(State(relay): State<Arc<ReqwestRelay>>, body: Bytes) -> Response {
	let de = &mut serde_json::Deserializer::from_slice(&body);
	let result = match serde_path_to_error::deserialize::<_, RefreshRequest>(de) {
		Ok(request) => relay.refresh_inline(request).await,
		Err(e) => Err(Error::malformed(format!("Invalid JSON in request: {e}"))),
	};

	respond(Outcome::from_result(Endpoint::Refresh, result))
}

pub(crate) async fn get(
	State(relay): State<Arc<ReqwestRelay>>,
	query: Result<Query<StoredRefreshQuery>, QueryRejection>,
) -> Response {
	let result = match stored_user(query) {
		Ok(user_id) => relay.refresh_stored(&user_id).await,
		Err(e) => Err(e),
	};

	respond(Outcome::from_result(Endpoint::Refresh, result))
}

fn stored_user(query: Result<Query<StoredRefreshQuery>, QueryRejection>) -> Result<UserId> {
	let Query(query) = query.map_err(|e| Error::malformed(format!("Invalid query: {e}")))?;
	let user_id = query
		.user_id
		.filter(|value| !value.is_empty())
		.ok_or_else(|| Error::malformed("Missing required query parameter: userId"))?;

	Ok(UserId::new(user_id)?)
}
