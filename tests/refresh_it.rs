// std
use std::sync::Arc;
// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;
// self
use sfdc_oauth_relay::{
	auth::TokenSecret,
	config::Config,
	flows::ReqwestRelay,
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	server,
	store::{MemorySecretStore, RemoteSecretStore, SecretStore, StoreError, StoreFuture},
};

const CLIENT_ID: &str = "client-refresh";
const CLIENT_SECRET: &str = "secret-refresh";
const TOKEN_PATH: &str = "/services/oauth2/token";
const SERVICE_KEY: &str = "service-role-key";

fn relay(store: Arc<dyn SecretStore>) -> ReqwestRelay {
	let config = Config {
		salesforce_client_id: Some(CLIENT_ID.into()),
		salesforce_client_secret: Some(CLIENT_SECRET.into()),
		..Config::default()
	};

	ReqwestRelay::with_http_client(
		config,
		ReqwestHttpClient::default(),
		Arc::new(ReqwestTransportErrorMapper),
	)
	.with_store(store)
}

/// Serves reads from a seeded map and fails every write.
#[derive(Default)]
struct ReadOnlyStore(MemorySecretStore);
impl SecretStore for ReadOnlyStore {
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
		self.0.read(key)
	}

	fn write<'a>(&'a self, _key: &'a str, _value: Value) -> StoreFuture<'a, ()> {
		Box::pin(async { Err(StoreError::backend("vault down")) })
	}
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("Router should be infallible.");
	let status = response.status();
	let bytes =
		response.into_body().collect().await.expect("Body should be readable.").to_bytes();

	(status, serde_json::from_slice(&bytes).expect("Body should be JSON."))
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Request should build.")
}

fn post_json(body: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/refresh-token")
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.expect("Request should build.")
}

async fn mock_refresh_without_rotation(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-new",
				"instance_url": server.base_url(),
				"token_type": "Bearer",
				"issued_at": "1735689600000"
			}));
		})
		.await
}

#[tokio::test]
async fn stored_refresh_keeps_refresh_token_when_not_rotated() {
	let server = MockServer::start_async().await;
	let mock = mock_refresh_without_rotation(&server).await;
	let store = Arc::new(MemorySecretStore::default());
	let instance = format!("{}/", server.base_url());

	store.insert(
		"u1",
		json!({ "refreshToken": "r1", "instanceUrl": instance, "authCode": "code-1", "scope": "api" }),
	);

	let (status, body) =
		send(server::router(relay(store.clone())), get("/refresh-token?userId=u1")).await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body,
		json!({
			"success": true,
			"instanceUrl": instance,
			"accessToken": "access-new",
			"tokenType": "Bearer",
			"refreshToken": "r1",
			"scope": "api",
			"issuedAt": "1735689600000",
			"authCode": "code-1"
		})
	);

	let persisted = store.get("u1").expect("Refreshed credentials should be persisted.");

	assert_eq!(persisted["refreshToken"], "r1");
	assert_eq!(persisted["accessToken"], "access-new");
}

#[tokio::test]
async fn unknown_user_is_reported_without_token_call() {
	let server = MockServer::start_async().await;
	let mock = mock_refresh_without_rotation(&server).await;
	let (status, body) = send(
		server::router(relay(Arc::new(MemorySecretStore::default()))),
		get("/refresh-token?userId=ghost"),
	)
	.await;

	mock.assert_calls_async(0).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["success"], false);
	assert_eq!(body["error"], "credentials_not_found");
}

#[tokio::test]
async fn inline_refresh_with_user_id_persists_rotated_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-new",
				"refresh_token": "r2",
				"token_type": "Bearer"
			}));
		})
		.await;
	let store = Arc::new(MemorySecretStore::default());
	let (status, body) = send(
		server::router(relay(store.clone())),
		post_json(json!({
			"instanceUrl": server.base_url(),
			"refreshToken": "r1",
			"accessToken": "access-old",
			"tokenType": "Bearer",
			"userId": "u2"
		})),
	)
	.await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["refreshToken"], "r2");
	assert_eq!(body["instanceUrl"], format!("{}/", server.base_url()));
	assert_eq!(store.get("u2").map(|value| value["refreshToken"].clone()), Some(json!("r2")));
}

#[tokio::test]
async fn raw_provider_error_text_becomes_unknown_error() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400).header("content-type", "text/plain").body("Bad request");
		})
		.await;
	let (status, body) = send(
		server::router(relay(Arc::new(MemorySecretStore::default()))),
		post_json(json!({ "instanceUrl": server.base_url(), "refreshToken": "r1" })),
	)
	.await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "token_refresh_failed");
	assert_eq!(body["error_description"], "unknown_error - Bad request");
}

#[tokio::test]
async fn remote_store_round_trips_through_rpc() {
	let server = MockServer::start_async().await;
	let instance = format!("{}/", server.base_url());
	let stored = json!({ "refreshToken": "r1", "instanceUrl": instance }).to_string();
	let read = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/rest/v1/rpc/read_secret")
				.header("apikey", SERVICE_KEY)
				.header("authorization", format!("Bearer {SERVICE_KEY}"));
			then.status(200).header("content-type", "application/json").json_body(json!(stored));
		})
		.await;
	let write = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/rest/v1/rpc/write_secret")
				.header("apikey", SERVICE_KEY)
				.header("authorization", format!("Bearer {SERVICE_KEY}"));
			then.status(204);
		})
		.await;
	let token = mock_refresh_without_rotation(&server).await;
	let store = RemoteSecretStore::new(
		reqwest::Client::new(),
		&server.base_url(),
		TokenSecret::new(SERVICE_KEY),
	)
	.expect("Remote store should build.");
	let (status, body) =
		send(server::router(relay(Arc::new(store))), get("/refresh-token?userId=u1")).await;

	read.assert_async().await;
	token.assert_async().await;
	write.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["refreshToken"], "r1");
	assert_eq!(body["accessToken"], "access-new");
}

#[tokio::test]
async fn remote_store_failure_is_a_processing_failure() {
	let server = MockServer::start_async().await;
	let read = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/v1/rpc/read_secret");
			then.status(500).body("vault down");
		})
		.await;
	let store = RemoteSecretStore::new(
		reqwest::Client::new(),
		&server.base_url(),
		TokenSecret::new(SERVICE_KEY),
	)
	.expect("Remote store should build.");
	let (status, body) =
		send(server::router(relay(Arc::new(store))), get("/refresh-token?userId=u1")).await;

	read.assert_async().await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"], "request_processing_failed");
	assert!(body["details"].as_str().is_some_and(|details| details.contains("vault down")));
}

async fn mock_rotating_refresh(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-new",
				"refresh_token": "r2-rotated",
				"token_type": "Bearer"
			}));
		})
		.await
}

#[tokio::test]
async fn failed_write_back_still_returns_rotated_credentials() {
	let server = MockServer::start_async().await;
	let mock = mock_rotating_refresh(&server).await;
	let store = ReadOnlyStore::default();

	store.0.insert("u1", json!({ "refreshToken": "r1", "instanceUrl": server.base_url() }));

	let (status, body) =
		send(server::router(relay(Arc::new(store))), get("/refresh-token?userId=u1")).await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["success"], true);
	assert_eq!(body["refreshToken"], "r2-rotated");
	assert_eq!(body["accessToken"], "access-new");
	assert!(body["warning"].as_str().is_some_and(|warning| warning.contains("vault down")));
}

#[tokio::test]
async fn inline_refresh_reports_failed_persist_without_losing_tokens() {
	let server = MockServer::start_async().await;
	let mock = mock_rotating_refresh(&server).await;
	let (status, body) = send(
		server::router(relay(Arc::new(ReadOnlyStore::default()))),
		post_json(json!({
			"instanceUrl": server.base_url(),
			"refreshToken": "r1",
			"userId": "u3"
		})),
	)
	.await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["refreshToken"], "r2-rotated");
	assert!(body["warning"].as_str().is_some_and(|warning| warning.contains("vault down")));
}

#[tokio::test]
async fn successful_write_back_carries_no_warning() {
	let server = MockServer::start_async().await;
	let mock = mock_rotating_refresh(&server).await;
	let store = Arc::new(MemorySecretStore::default());

	store.insert("u1", json!({ "refreshToken": "r1", "instanceUrl": server.base_url() }));

	let (status, body) =
		send(server::router(relay(store.clone())), get("/refresh-token?userId=u1")).await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.get("warning").is_none());
	assert_eq!(store.get("u1").map(|value| value["refreshToken"].clone()), Some(json!("r2-rotated")));
}
