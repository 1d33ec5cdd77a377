//! Refresh token orchestration, inline or backed by the secret store.
//!
//! Inline refreshes take the credential set from the request body; store-backed refreshes
//! read it by [`UserId`], refresh, and write the updated set back while holding the user's
//! singleflight guard. A provider response without `refresh_token` keeps the previous one.
//!
//! Once the provider has answered, the refreshed set is always returned: a rotated refresh
//! token may already have invalidated the stored one, so a failed write is reported as a
//! warning next to the credentials instead of replacing them with an error.

// self
use crate::{
	_prelude::*,
	auth::{CredentialsDraft, RefreshableCredentials, TokenCredentials, UserId},
	flows::{Relay, common},
	http::TokenHttpClient,
	oauth::{GrantType, TransportErrorMapper},
	obs::FlowKind,
	store::StoreError,
};

/// Body of an inline refresh request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
	/// Credential set to refresh.
	#[serde(flatten)]
	pub credentials: CredentialsDraft,
	/// When present, the refreshed set is also persisted under this key.
	#[serde(default)]
	pub user_id: Option<String>,
}

/// Credentials produced by a refresh, plus the outcome of writing them back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
	/// Refreshed credential set.
	#[serde(flatten)]
	pub credentials: TokenCredentials,
	/// Set when the refreshed credentials could not be written to the secret store.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub warning: Option<String>,
}
impl RefreshOutcome {
	fn without_store(credentials: TokenCredentials) -> Self {
		Self { credentials, warning: None }
	}
}

impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Refreshes an inline credential set, persisting it when a `userId` accompanies it.
	pub async fn refresh_inline(&self, request: RefreshRequest) -> Result<RefreshOutcome> {
		common::observed(FlowKind::Refresh, "refresh_inline", async move {
			let user_id = request.user_id.as_deref().map(UserId::new).transpose()?;
			let current = request.credentials.into_refreshable()?;

			match user_id {
				Some(user_id) => {
					let guard = common::flow_guard(self, &user_id);
					let _singleflight = guard.lock().await;
					let updated = self.refresh_credentials(current).await?;

					Ok(self.write_back(&user_id, updated).await)
				},
				None => self.refresh_credentials(current).await.map(RefreshOutcome::without_store),
			}
		})
		.await
	}

	/// Performs a single `grant_type=refresh_token` call and applies the retention rule.
	pub async fn refresh_credentials(
		&self,
		current: RefreshableCredentials,
	) -> Result<TokenCredentials> {
		let facade = common::facade(self, GrantType::RefreshToken, &current.instance_url)?;

		tracing::debug!(endpoint = %facade.token_endpoint(), "refreshing access token");

		let tokens = facade.refresh_token(&current.refresh_token).await?;

		Ok(current.apply(tokens))
	}

	/// Refreshes the credential set stored under `user_id` and writes the result back.
	pub async fn refresh_stored(&self, user_id: &UserId) -> Result<RefreshOutcome> {
		common::observed(FlowKind::Refresh, "refresh_stored", async move {
			let store = self.secret_store()?;
			let guard = common::flow_guard(self, user_id);
			let _singleflight = guard.lock().await;
			let stored = store
				.read(user_id)
				.await?
				.ok_or_else(|| Error::CredentialsNotFound { user_id: user_id.to_string() })?;
			let draft: CredentialsDraft = serde_path_to_error::deserialize(stored)
				.map_err(|e| StoreError::serialization(format!("stored credentials: {e}")))?;
			let updated = self.refresh_credentials(draft.into_refreshable()?).await?;
			let outcome = self.write_back(user_id, updated).await;

			tracing::info!(
				%user_id,
				persisted = outcome.warning.is_none(),
				"stored credentials refreshed"
			);

			Ok(outcome)
		})
		.await
	}

	async fn write_back(&self, user_id: &UserId, credentials: TokenCredentials) -> RefreshOutcome {
		let warning = match self.persist(user_id, &credentials).await {
			Ok(()) => None,
			Err(e) => {
				tracing::error!(%user_id, error = %e, "refreshed credentials were not persisted");

				Some(format!("Refreshed credentials could not be persisted: {e}"))
			},
		};

		RefreshOutcome { credentials, warning }
	}

	/// Writes `credentials` to the secret store under `user_id`.
	pub async fn persist(&self, user_id: &UserId, credentials: &TokenCredentials) -> Result<()> {
		let store = self.secret_store()?;
		let value = serde_json::to_value(credentials)
			.map_err(|e| StoreError::serialization(format!("credentials: {e}")))?;

		store.write(user_id, value).await?;

		Ok(())
	}
}
