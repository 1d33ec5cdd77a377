//! Token credential sets and the refresh-token retention rule.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	instance::InstanceUrl,
	oauth::IssuedTokens,
};

/// Credential set produced by a code exchange and updated by every refresh.
///
/// Serialized in camelCase; absent optional fields are omitted rather than written as
/// `null`. The same shape is used for HTTP responses and for secret-store blobs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCredentials {
	/// Tenant base URL in display form.
	pub instance_url: InstanceUrl,
	/// Access token for Salesforce API calls.
	pub access_token: TokenSecret,
	/// Token type reported by the provider.
	pub token_type: String,
	/// Access token lifetime in seconds, when the provider reports one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Long-lived refresh token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Space-delimited granted scopes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Provider issuance timestamp (epoch milliseconds, as text).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<String>,
	/// Authorization code the set originated from; kept for older clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_code: Option<String>,
}
impl TokenCredentials {
	/// Builds a fresh set from a code exchange.
	///
	/// The provider's `instance_url` wins over `fallback`, which is the instance the
	/// exchange was addressed to.
	pub fn issued(tokens: IssuedTokens, fallback: InstanceUrl, auth_code: Option<String>) -> Self {
		let IssuedTokens {
			access_token,
			token_type,
			expires_in,
			refresh_token,
			scope,
			instance_url,
			issued_at,
		} = tokens;

		Self {
			instance_url: issued_instance(instance_url.as_deref(), fallback),
			access_token,
			token_type,
			expires_in,
			refresh_token,
			scope,
			issued_at,
			auth_code,
		}
	}

	/// Parses [`TokenCredentials::issued_at`] into an instant.
	pub fn issued_at_time(&self) -> Option<OffsetDateTime> {
		let millis = self.issued_at.as_deref()?.trim().parse::<i128>().ok()?;

		OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
	}

	/// Expiry instant, when both the issuance time and lifetime are known.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let lifetime = i64::try_from(self.expires_in?).ok()?;

		self.issued_at_time()?.checked_add(Duration::seconds(lifetime))
	}
}
impl Debug for TokenCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCredentials")
			.field("instance_url", &self.instance_url)
			.field("access_token", &self.access_token)
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("auth_code", &self.auth_code.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Minimum state needed to refresh a credential set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshableCredentials {
	/// Instance the refresh is addressed to.
	pub instance_url: InstanceUrl,
	/// Refresh token presented to the provider.
	pub refresh_token: TokenSecret,
	/// Scope previously granted, retained when the provider omits it.
	pub scope: Option<String>,
	/// Legacy authorization code carried through unchanged.
	pub auth_code: Option<String>,
}
impl RefreshableCredentials {
	/// Merges a refresh response into an updated credential set.
	///
	/// The previous refresh token and scope survive unless the provider reissues them;
	/// a missing `refresh_token` never clears the stored one.
	pub fn apply(self, tokens: IssuedTokens) -> TokenCredentials {
		let IssuedTokens {
			access_token,
			token_type,
			expires_in,
			refresh_token,
			scope,
			instance_url,
			issued_at,
		} = tokens;

		TokenCredentials {
			instance_url: issued_instance(instance_url.as_deref(), self.instance_url),
			access_token,
			token_type,
			expires_in,
			refresh_token: Some(refresh_token.unwrap_or(self.refresh_token)),
			scope: scope.or(self.scope),
			issued_at,
			auth_code: self.auth_code,
		}
	}
}

/// Loosely typed credential set as found in request bodies and secret-store blobs.
///
/// Every field is optional so validation can report the first missing one by its wire
/// name instead of failing inside serde.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsDraft {
	/// Tenant base URL.
	pub instance_url: Option<String>,
	/// Refresh token.
	pub refresh_token: Option<String>,
	/// Previous access token (ignored by the refresh itself).
	pub access_token: Option<String>,
	/// Previous token type.
	pub token_type: Option<String>,
	/// Previously granted scope.
	pub scope: Option<String>,
	/// Legacy authorization code.
	pub auth_code: Option<String>,
}
impl CredentialsDraft {
	/// Validates the draft into [`RefreshableCredentials`].
	pub fn into_refreshable(self) -> Result<RefreshableCredentials> {
		let refresh_token = self
			.refresh_token
			.map(TokenSecret::from)
			.filter(|secret| !secret.is_blank())
			.ok_or_else(|| Error::malformed("Missing required field: refreshToken"))?;
		let instance_url = self
			.instance_url
			.filter(|value| !value.trim().is_empty())
			.ok_or_else(|| Error::malformed("Missing required field: instanceUrl"))?;
		let instance_url = InstanceUrl::parse(instance_url)?;

		Ok(RefreshableCredentials {
			instance_url,
			refresh_token,
			scope: self.scope.filter(|value| !value.is_empty()),
			auth_code: self.auth_code.filter(|value| !value.is_empty()),
		})
	}
}

fn issued_instance(reported: Option<&str>, fallback: InstanceUrl) -> InstanceUrl {
	match reported.filter(|value| !value.trim().is_empty()).map(InstanceUrl::parse) {
		Some(Ok(instance)) => instance,
		Some(Err(e)) => {
			tracing::warn!(error = %e, fallback = %fallback, "token response carried an unusable instance_url");

			fallback
		},
		None => fallback,
	}
}
