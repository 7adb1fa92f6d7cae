//! Access tokens and the market/locale scope they are minted for.

// self
use crate::{
	_prelude::*,
	model::{Locale, Market},
};

/// Redacted access token keeping the bearer secret out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Market + locale pair an anonymous user (and therefore its token) belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenScope {
	/// Market the user is created in.
	pub market: Market,
	/// Locale used for service-side messages.
	pub locale: Locale,
}
impl TokenScope {
	/// Creates a scope for the provided market and locale.
	pub fn new(market: Market, locale: Locale) -> Self {
		Self { market, locale }
	}
}
impl Display for TokenScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.market, self.locale)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_formatters_redact() {
		let token = AccessToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert_eq!(token.expose(), "super-secret");
	}

	#[test]
	fn scope_display_joins_market_and_locale() {
		let scope = TokenScope::new(
			Market::new("NO").expect("Market fixture should be valid."),
			Locale::new("nb_NO").expect("Locale fixture should be valid."),
		);

		assert_eq!(scope.to_string(), "NO/nb_NO");
	}
}
