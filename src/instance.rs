//! Salesforce instance URLs and token endpoint derivation.
//!
//! A tenant is reachable through two domain families: the user-facing Lightning domain
//! (`*.lightning.force.com`) and the My Domain host (`*.my.salesforce.com`) that serves
//! OAuth. [`InstanceUrl`] keeps the display form handed back to callers (always ending in
//! `/`) and derives the My Domain token endpoint on demand.

// self
use crate::_prelude::*;

const LIGHTNING_DOMAIN: &str = "lightning.force.com";
const MY_DOMAIN: &str = "my.salesforce.com";
const DEVELOP_LIGHTNING_DOMAIN: &str = "develop.lightning.force.com";
const DEVELOP_MY_DOMAIN: &str = "develop.my.salesforce.com";
const TOKEN_PATH: &str = "/services/oauth2/token";

/// Errors raised while parsing or resolving an instance URL.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum InstanceUrlError {
	/// No usable source for the instance URL was supplied.
	#[error(
		"Unable to determine the Salesforce instance URL: no instance_url parameter or referer header was provided."
	)]
	Undetermined,
	/// The value was empty.
	#[error("Instance URL cannot be empty.")]
	Empty,
	/// The value is not an absolute URL.
	#[error("Instance URL `{value}` is invalid: {source}.")]
	Invalid {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The value uses a scheme other than `http`/`https` or lacks a host.
	#[error("Instance URL `{value}` must be an http(s) URL with a host.")]
	Unsupported {
		/// Offending value.
		value: String,
	},
}
impl From<InstanceUrlError> for Error {
	fn from(e: InstanceUrlError) -> Self {
		Error::malformed(e.to_string())
	}
}

/// Tenant base URL in display form (trailing `/` guaranteed).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceUrl(String);
impl InstanceUrl {
	/// Validates `value` and normalizes it to display form.
	pub fn parse(value: impl AsRef<str>) -> Result<Self, InstanceUrlError> {
		let value = value.as_ref().trim();

		if value.is_empty() {
			return Err(InstanceUrlError::Empty);
		}

		let parsed = Url::parse(value)
			.map_err(|source| InstanceUrlError::Invalid { value: value.to_owned(), source })?;

		if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
			return Err(InstanceUrlError::Unsupported { value: value.to_owned() });
		}

		let mut display = value.to_owned();

		if !display.ends_with('/') {
			display.push('/');
		}

		Ok(Self(display))
	}

	/// Derives the instance from a referer header, keeping only `scheme://host[:port]/`.
	pub fn from_referer(referer: &str) -> Result<Self, InstanceUrlError> {
		let parsed = Url::parse(referer.trim())
			.map_err(|source| InstanceUrlError::Invalid { value: referer.to_owned(), source })?;

		if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
			return Err(InstanceUrlError::Unsupported { value: referer.to_owned() });
		}

		Self::parse(parsed.origin().ascii_serialization())
	}

	/// Picks the display instance URL for a callback.
	///
	/// An explicit `instance_url` always wins over the referer. A referer that cannot be
	/// parsed is skipped. When neither yields a URL the callback cannot be attributed to a
	/// tenant and resolution fails.
	pub fn resolve(explicit: Option<&str>, referer: Option<&str>) -> Result<Self, InstanceUrlError> {
		if let Some(explicit) = explicit.filter(|value| !value.trim().is_empty()) {
			return Self::parse(explicit);
		}
		if let Some(referer) = referer.filter(|value| !value.trim().is_empty()) {
			match Self::from_referer(referer) {
				Ok(instance) => return Ok(instance),
				Err(e) => tracing::warn!(referer, error = %e, "ignoring unparsable referer"),
			}
		}

		Err(InstanceUrlError::Undetermined)
	}

	/// Display form, always ending in `/`.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns `true` for Lightning-domain URLs that need the My Domain substitution.
	pub fn is_lightning(&self) -> bool {
		self.0.contains(LIGHTNING_DOMAIN)
	}

	/// My Domain base URL without a trailing slash.
	pub fn oauth_base(&self) -> String {
		let base = if self.is_lightning() {
			self.0
				.replace(DEVELOP_LIGHTNING_DOMAIN, DEVELOP_MY_DOMAIN)
				.replace(LIGHTNING_DOMAIN, MY_DOMAIN)
		} else {
			self.0.clone()
		};

		base.trim_end_matches('/').to_owned()
	}

	/// OAuth token endpoint: `{oauth_base}/services/oauth2/token`.
	pub fn token_endpoint(&self) -> Result<Url, InstanceUrlError> {
		let endpoint = format!("{}{TOKEN_PATH}", self.oauth_base());

		Url::parse(&endpoint).map_err(|source| InstanceUrlError::Invalid { value: endpoint, source })
	}
}
impl TryFrom<String> for InstanceUrl {
	type Error = InstanceUrlError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
impl From<InstanceUrl> for String {
	fn from(value: InstanceUrl) -> Self {
		value.0
	}
}
impl FromStr for InstanceUrl {
	type Err = InstanceUrlError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl AsRef<str> for InstanceUrl {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for InstanceUrl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "InstanceUrl({})", self.0)
	}
}
impl Display for InstanceUrl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn instance(value: &str) -> InstanceUrl {
		InstanceUrl::parse(value).expect("Instance URL fixture should parse.")
	}

	#[test]
	fn develop_lightning_maps_to_develop_my_domain() {
		let url = instance("https://orgfarm-a3ae3ef50e-dev-ed.develop.lightning.force.com/");

		assert_eq!(
			url.token_endpoint().expect("Token endpoint should derive.").as_str(),
			"https://orgfarm-a3ae3ef50e-dev-ed.develop.my.salesforce.com/services/oauth2/token"
		);
	}

	#[test]
	fn production_lightning_maps_to_my_domain() {
		let url = instance("https://acme.lightning.force.com");

		assert!(url.is_lightning());
		assert_eq!(url.oauth_base(), "https://acme.my.salesforce.com");
	}

	#[test]
	fn my_domain_passes_through_without_trailing_slash() {
		for raw in ["https://acme.my.salesforce.com/", "https://acme.my.salesforce.com"] {
			let url = instance(raw);

			assert!(!url.is_lightning());
			assert_eq!(
				url.token_endpoint().expect("Token endpoint should derive.").as_str(),
				"https://acme.my.salesforce.com/services/oauth2/token"
			);
		}
	}

	#[test]
	fn display_form_always_ends_with_slash() {
		assert_eq!(instance("https://acme.my.salesforce.com").as_str(), "https://acme.my.salesforce.com/");
		assert_eq!(
			instance("https://acme.my.salesforce.com/").to_string(),
			"https://acme.my.salesforce.com/"
		);
	}

	#[test]
	fn referer_keeps_origin_only() {
		let url = InstanceUrl::from_referer("https://acme.my.salesforce.com/foo?bar=1")
			.expect("Referer should yield an instance URL.");

		assert_eq!(url.as_str(), "https://acme.my.salesforce.com/");

		let local = InstanceUrl::from_referer("http://127.0.0.1:8080/lightning/page")
			.expect("Referer with a port should yield an instance URL.");

		assert_eq!(local.as_str(), "http://127.0.0.1:8080/");
	}

	#[test]
	fn explicit_instance_beats_referer() {
		let url = InstanceUrl::resolve(
			Some("https://explicit.my.salesforce.com"),
			Some("https://referer.my.salesforce.com/foo"),
		)
		.expect("Explicit instance should resolve.");

		assert_eq!(url.as_str(), "https://explicit.my.salesforce.com/");
	}

	#[test]
	fn resolution_fails_without_any_source() {
		assert_eq!(InstanceUrl::resolve(None, None), Err(InstanceUrlError::Undetermined));
		assert_eq!(InstanceUrl::resolve(Some(""), Some("not a url")), Err(InstanceUrlError::Undetermined));
	}

	#[test]
	fn rejects_non_http_values() {
		assert_eq!(InstanceUrl::parse("   "), Err(InstanceUrlError::Empty));
		assert!(matches!(
			InstanceUrl::parse("mailto:ops@example.com"),
			Err(InstanceUrlError::Unsupported { .. })
		));
		assert!(matches!(InstanceUrl::parse("acme"), Err(InstanceUrlError::Invalid { .. })));
	}

	#[test]
	fn serde_uses_display_form() {
		let url: InstanceUrl = serde_json::from_str("\"https://x.my.salesforce.com\"")
			.expect("Instance URL should deserialize.");

		assert_eq!(
			serde_json::to_string(&url).expect("Instance URL should serialize."),
			"\"https://x.my.salesforce.com/\""
		);
	}
}
