//! Shared helpers for flow implementations (facade construction, guards, flow wrapping).

// crates.io
use async_lock::MutexGuard as AsyncMutexGuard;
// self
use crate::{
	_prelude::*,
	auth::UserId,
	flows::Relay,
	http::TokenHttpClient,
	instance::InstanceUrl,
	oauth::{GrantType, TokenFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Per-key singleflight locks shared by every clone of a relay.
pub(crate) type FlowGuards = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

/// Handle on one key's singleflight lock.
///
/// The map entry is removed when the last handle for the key drops, so the map only holds
/// keys with a flow in progress.
pub(crate) struct FlowGuard {
	key: UserId,
	guards: FlowGuards,
	lock: Arc<AsyncMutex<()>>,
}
impl FlowGuard {
	/// Waits for exclusive access to the key.
	pub(crate) async fn lock(&self) -> AsyncMutexGuard<'_, ()> {
		self.lock.lock().await
	}
}
impl Drop for FlowGuard {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// Handles are only cloned under the map lock; 2 means the map's copy and ours.
		if Arc::strong_count(&self.lock) == 2 {
			guards.remove(&self.key);
		}
	}
}

/// Returns (and creates on demand) the singleflight guard for a store key.
pub(crate) fn flow_guard<C, M>(relay: &Relay<C, M>, key: &UserId) -> FlowGuard
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let lock = relay
		.flow_guards
		.lock()
		.entry(key.clone())
		.or_insert_with(|| Arc::new(AsyncMutex::new(())))
		.clone();

	FlowGuard { key: key.clone(), guards: relay.flow_guards.clone(), lock }
}

/// Builds a token facade addressed to `instance`, validating client credentials first.
pub(crate) fn facade<C, M>(
	relay: &Relay<C, M>,
	grant: GrantType,
	instance: &InstanceUrl,
) -> Result<TokenFacade<C, M>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let credentials = relay.config.client_credentials(grant)?;

	TokenFacade::for_instance(
		instance,
		&credentials,
		relay.http_client.clone(),
		relay.transport_mapper.clone(),
	)
}

/// Runs `fut` inside a flow span and records its attempt + outcome.
pub(crate) async fn observed<T, F>(kind: FlowKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			let upstream_status = match e {
				Error::TokenEndpoint(inner) => inner.status(),
				_ => None,
			};

			tracing::warn!(flow = %kind, stage, error = %e, upstream_status, "flow failed");
			obs::record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}
