//! HTTP boundary: routes, CORS headers, and response shaping.
//!
//! Both endpoints answer `OPTIONS` with `ok`, reject other unsupported methods with a
//! processing failure, and stamp every response with permissive CORS headers. Every flow
//! error is converted into a JSON body here; none escapes as a fault.

mod callback;
mod refresh;
mod response;

pub use callback::CallbackBody;
pub use response::*;

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	http::{
		HeaderValue, Method,
		header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN},
	},
	response::{IntoResponse, Response},
	routing::get,
};
use tokio::net::TcpListener;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
// self
use crate::{_prelude::*, flows::ReqwestRelay};

const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Builds the relay router.
pub fn router(relay: ReqwestRelay) -> Router {
	Router::new()
		.route(
			"/callback",
			get(callback::get).post(callback::post).options(preflight).fallback(unsupported_callback),
		)
		.route(
			"/refresh-token",
			get(refresh::get).post(refresh::post).options(preflight).fallback(unsupported_refresh),
		)
		.with_state(Arc::new(relay))
		.layer(SetResponseHeaderLayer::overriding(
			ACCESS_CONTROL_ALLOW_ORIGIN,
			HeaderValue::from_static("*"),
		))
		.layer(SetResponseHeaderLayer::overriding(
			ACCESS_CONTROL_ALLOW_HEADERS,
			HeaderValue::from_static(ALLOWED_HEADERS),
		))
		.layer(TraceLayer::new_for_http())
}

/// Serves the router on `addr` until Ctrl-C.
pub async fn serve(relay: ReqwestRelay, addr: SocketAddr) -> std::io::Result<()> {
	let listener = TcpListener::bind(addr).await?;

	tracing::info!(addr = %listener.local_addr()?, "relay listening");

	axum::serve(listener, router(relay)).with_graceful_shutdown(shutdown_signal()).await
}

pub(crate) fn respond<T>(outcome: Outcome<T>) -> Response
where
	T: Serialize,
{
	if let Outcome::Failure(failure) = &outcome {
		tracing::warn!(
			status = failure.status.as_u16(),
			error = %failure.error,
			details = failure.details.as_deref().unwrap_or_default(),
			"request failed"
		);
	}

	outcome.into_response()
}

async fn preflight() -> &'static str {
	"ok"
}

async fn unsupported_callback(method: Method) -> Response {
	unsupported(Endpoint::Callback, method)
}

async fn unsupported_refresh(method: Method) -> Response {
	unsupported(Endpoint::Refresh, method)
}

fn unsupported(endpoint: Endpoint, method: Method) -> Response {
	respond(Outcome::<()>::Failure(Failure::processing(
		endpoint,
		format!("Method {method} not allowed"),
	)))
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to listen for shutdown signal");
	}

	tracing::info!("shutting down");
}
