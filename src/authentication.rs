//! API tokens handed out by the `apstra_api_token` ephemeral resource.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ApstraClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostics, Schema};
use crate::value::AttrValue;

/// Seconds before expiry at which a warning is raised.
pub const DEFAULT_WARN_SECONDS: i64 = 60;

/// Largest `warn_seconds` a chrono duration can hold.
pub const MAX_WARN_SECONDS: i64 = i64::MAX / 1_000;

/// Ephemeral resource type name.
pub const API_TOKEN_TYPE: &str = "apstra_api_token";

/// The `apstra_api_token` configuration and result object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToken {
    /// The JWT.
    pub value: AttrValue<String>,
    /// Login session id, from the `user_session` claim.
    pub session_id: AttrValue<String>,
    /// From the `username` claim.
    pub user_name: AttrValue<String>,
    /// Warn when renewing this close to expiry.
    pub warn_seconds: AttrValue<i64>,
    /// Leave the session open on close.
    pub do_not_log_out: AttrValue<bool>,
    /// From the `exp` claim. Not part of the result.
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    username: String,
    #[serde(default)]
    user_session: String,
    exp: i64,
}

impl ApiToken {
    /// Schema of the ephemeral resource.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "value",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("The API token value."),
            )
            .with_attribute(
                "session_id",
                Attribute::computed_string()
                    .with_description("The API session ID associated with the token."),
            )
            .with_attribute(
                "user_name",
                Attribute::computed_string()
                    .with_description("The user name associated with the session ID."),
            )
            .with_attribute(
                "warn_seconds",
                Attribute::optional_computed_int64().with_description(format!(
                    "Produce a warning when the token is referenced with less than this many \
                     seconds remaining before expiration. `0` disables warnings. Default `{}`.",
                    DEFAULT_WARN_SECONDS
                )),
            )
            .with_attribute(
                "do_not_log_out",
                Attribute::optional_bool().with_description(
                    "When `true`, the session is left open on Close and stays valid until it expires.",
                ),
            )
    }

    /// Reject negative or unrepresentable `warn_seconds`.
    pub fn validate(&self, diags: &mut Diagnostics) {
        crate::validation::between("warn_seconds", &self.warn_seconds, 0, MAX_WARN_SECONDS, diags);
    }

    /// Fill in defaults for optional attributes.
    pub fn set_defaults(&mut self) {
        if !self.warn_seconds.is_known() {
            self.warn_seconds = AttrValue::Known(DEFAULT_WARN_SECONDS);
        }
    }

    /// Populate value, user and session from a JWT.
    pub fn load_api_data(&mut self, token: &str, diags: &mut Diagnostics) {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            diags.add_error(
                "Failed to parse API token",
                format!("JWT should have 3 parts, got {}", parts.len()),
            );
            return;
        }

        let claims_b64 = parts[1].trim_end_matches('=');
        let claims_bytes = match URL_SAFE_NO_PAD
            .decode(claims_b64)
            .or_else(|_| STANDARD_NO_PAD.decode(claims_b64))
        {
            Ok(b) => b,
            Err(err) => {
                diags.add_error(
                    "Failed to parse API token",
                    format!("failed base64 decoding token claims: {}", err),
                );
                return;
            },
        };

        let claims: Claims = match serde_json::from_slice(&claims_bytes) {
            Ok(c) => c,
            Err(err) => {
                diags.add_error(
                    "Failed to parse API token",
                    format!("failed unmarshaling token claims JSON payload: {}", err),
                );
                return;
            },
        };

        let Some(expires_at) = DateTime::from_timestamp(claims.exp, 0) else {
            diags.add_error(
                "Failed to parse API token",
                format!("token expiration {} is out of range", claims.exp),
            );
            return;
        };

        self.value = AttrValue::Known(token.to_string());
        self.user_name = AttrValue::Known(claims.username);
        self.session_id = AttrValue::Known(claims.user_session);
        self.expires_at = Some(expires_at);
    }

    /// Private state for later Renew and Close calls.
    pub fn private_state(&self) -> EphemeralApiToken {
        EphemeralApiToken {
            token: self.value.value_or_default(),
            expires_at: self.expires_at.unwrap_or_else(Utc::now),
            warn_threshold: self.warn_seconds.known_or(DEFAULT_WARN_SECONDS),
            do_not_log_out: self.do_not_log_out.known_or(false),
        }
    }
}

/// Token details kept in ephemeral private state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralApiToken {
    /// The JWT, used as the `AuthToken` header on logout.
    pub token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
    /// Seconds.
    pub warn_threshold: i64,
    /// Skip logout on close.
    pub do_not_log_out: bool,
}

impl EphemeralApiToken {
    fn warn_window(&self) -> Option<Duration> {
        Duration::try_seconds(self.warn_threshold)
    }

    /// When the host should next call Renew.
    ///
    /// A window reaching past the earliest representable time renews at once.
    pub fn renew_at(&self) -> DateTime<Utc> {
        self.warn_window()
            .and_then(|window| self.expires_at.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Check the token's remaining lifetime.
    ///
    /// Expired tokens are an error. Tokens inside the warning window get a
    /// warning.
    pub fn check_lifetime(&self, now: DateTime<Utc>, diags: &mut Diagnostics) {
        if now > self.expires_at {
            diags.add_error(
                "API token has expired",
                format!(
                    "Token expired at: {}. Current time is: {}",
                    self.expires_at, now
                ),
            );
            return;
        }

        let in_window = match self.warn_window().and_then(|window| now.checked_add_signed(window)) {
            Some(warn_from) => warn_from > self.expires_at,
            None => true,
        };
        if in_window {
            diags.add_warning(
                format!(
                    "API token expires within {} second warning threshold",
                    self.warn_threshold
                ),
                format!("API token expires at {}. Current time: {}", self.expires_at, now),
            );
        }
    }

    /// Renew: validates the lifetime and returns the next renewal time.
    pub fn renew(&self, now: DateTime<Utc>, diags: &mut Diagnostics) -> Option<DateTime<Utc>> {
        self.check_lifetime(now, diags);
        if diags.has_error() {
            return None;
        }
        Some(self.expires_at)
    }

    /// Close: log the session out unless asked not to or already expired.
    ///
    /// `client` must be a fresh session; its token is replaced. A 401 from
    /// the server means the session is already gone and is not an error.
    pub async fn close(
        &self,
        client: &ApstraClient,
        now: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        if self.do_not_log_out {
            debug!("api token close: do_not_log_out set");
            return Ok(());
        }
        if now > self.expires_at {
            debug!("api token close: token already expired");
            return Ok(());
        }

        client.set_token(Some(self.token.clone()));
        match client.logout().await {
            Ok(()) => Ok(()),
            Err(err) if err.is_unauthorized() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn make_jwt(username: &str, session: &str, exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "username": username,
                "user_session": session,
                "exp": exp,
            })
            .to_string(),
        );
        format!("{}.{}.signature", header, claims)
    }

    #[test]
    fn test_load_api_data() {
        let jwt = make_jwt("admin", "c0ffee", 1_900_000_000);
        let mut token = ApiToken::default();
        let mut diags = Diagnostics::new();
        token.load_api_data(&jwt, &mut diags);

        assert!(diags.is_empty());
        assert_eq!(token.value, AttrValue::Known(jwt));
        assert_eq!(token.user_name, AttrValue::Known("admin".to_string()));
        assert_eq!(token.session_id, AttrValue::Known("c0ffee".to_string()));
        assert_eq!(
            token.expires_at,
            Some(Utc.timestamp_opt(1_900_000_000, 0).unwrap())
        );
    }

    #[test]
    fn test_load_api_data_errors() {
        for bad in ["one.two", "a.!!!.c", "a.bm90IGpzb24.c"] {
            let mut token = ApiToken::default();
            let mut diags = Diagnostics::new();
            token.load_api_data(bad, &mut diags);
            assert!(diags.has_error(), "{}", bad);
            assert_eq!(diags[0].summary, "Failed to parse API token");
            assert!(token.value.is_null());
        }
    }

    #[test]
    fn test_defaults_and_private_state() {
        let mut token = ApiToken::default();
        token.set_defaults();
        assert_eq!(token.warn_seconds, AttrValue::Known(DEFAULT_WARN_SECONDS));

        token.expires_at = Some(Utc.timestamp_opt(1000, 0).unwrap());
        let ps = token.private_state();
        assert_eq!(ps.warn_threshold, 60);
        assert!(!ps.do_not_log_out);
        assert_eq!(ps.renew_at(), Utc.timestamp_opt(940, 0).unwrap());
    }

    #[test]
    fn test_validate_negative_warn_seconds() {
        let token = ApiToken {
            warn_seconds: AttrValue::Known(-1),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        token.validate(&mut diags);
        assert!(diags.has_error());
    }

    #[test]
    fn test_validate_warn_seconds_upper_bound() {
        let mut token = ApiToken {
            warn_seconds: AttrValue::Known(MAX_WARN_SECONDS),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        token.validate(&mut diags);
        assert!(diags.is_empty());

        token.warn_seconds = AttrValue::Known(i64::MAX);
        token.validate(&mut diags);
        assert!(diags.has_error());
    }

    #[test]
    fn test_huge_warn_threshold_does_not_overflow() {
        let now = Utc.timestamp_opt(1000, 0).unwrap();
        for threshold in [MAX_WARN_SECONDS, i64::MAX] {
            let token = EphemeralApiToken {
                warn_threshold: threshold,
                ..ephemeral(2000)
            };
            assert_eq!(token.renew_at(), DateTime::<Utc>::MIN_UTC);

            let mut diags = Diagnostics::new();
            token.check_lifetime(now, &mut diags);
            assert!(!diags.has_error());
            assert_eq!(diags.len(), 1, "threshold {}", threshold);
        }
    }

    fn ephemeral(expires: i64) -> EphemeralApiToken {
        EphemeralApiToken {
            token: "t".into(),
            expires_at: Utc.timestamp_opt(expires, 0).unwrap(),
            warn_threshold: 60,
            do_not_log_out: false,
        }
    }

    #[test]
    fn test_renew() {
        let now = Utc.timestamp_opt(1000, 0).unwrap();

        let mut diags = Diagnostics::new();
        assert_eq!(
            ephemeral(2000).renew(now, &mut diags),
            Some(Utc.timestamp_opt(2000, 0).unwrap())
        );
        assert!(diags.is_empty());

        let mut diags = Diagnostics::new();
        assert!(ephemeral(1030).renew(now, &mut diags).is_some());
        assert!(!diags.has_error());
        assert_eq!(diags.len(), 1);

        let mut diags = Diagnostics::new();
        assert!(ephemeral(999).renew(now, &mut diags).is_none());
        assert_eq!(diags[0].summary, "API token has expired");
    }

    #[tokio::test]
    async fn test_close_skips_logout() {
        // Unroutable address: any request would fail.
        let client = ApstraClient::with_client(
            reqwest::Client::new(),
            url::Url::parse("http://127.0.0.1:9").unwrap(),
        );
        let now = Utc.timestamp_opt(1000, 0).unwrap();

        let mut token = ephemeral(2000);
        token.do_not_log_out = true;
        assert!(token.close(&client, now).await.is_ok());

        let token = ephemeral(500);
        assert!(token.close(&client, now).await.is_ok());
    }
}
