//! Credential variants and the login material derived from them.

mod obfuscation;

pub use obfuscation::{obfuscate, obfuscate_now, ObfuscatedKey, MIN_SEED_LEN};

use crate::errors::{ZscalerError, ZscalerResult};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Credentials used to open a session, fixed at client construction.
#[derive(Debug, Clone)]
pub enum Credential {
    /// API key + admin username/password; the key is obfuscated per login.
    LegacyApiKey(LegacyApiKey),
    /// OAuth client credentials exchanged for a bearer token (form body).
    OAuthClient(ClientCredentials),
    /// Key id + secret; the secret is hashed with the login timestamp.
    HashedKey(HashedKeyCredentials),
    /// Client id + secret exchanged for a JWT sent as `auth-token`.
    SessionToken(ClientCredentials),
    /// Caller-provided token sent as a query parameter on every request.
    SandboxToken(SecretString),
}

/// Legacy API key credentials.
#[derive(Debug, Clone)]
pub struct LegacyApiKey {
    /// Obfuscation seed.
    pub api_key: SecretString,
    /// Admin username.
    pub username: String,
    /// Admin password.
    pub password: SecretString,
}

/// Client id/secret pair.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Client id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

/// Key id/secret pair for hashed-secret logins.
#[derive(Debug, Clone)]
pub struct HashedKeyCredentials {
    /// Key id.
    pub key_id: String,
    /// Key secret.
    pub key_secret: SecretString,
}

/// Body of a login request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginPayload {
    /// JSON body, sent without key translation.
    Json(Value),
    /// `application/x-www-form-urlencoded` body.
    Form(Vec<(String, String)>),
    /// No login round-trip.
    None,
}

impl Credential {
    /// Creates legacy API key credentials.
    pub fn legacy(
        api_key: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::LegacyApiKey(LegacyApiKey {
            api_key: SecretString::new(api_key.into()),
            username: username.into(),
            password: SecretString::new(password.into()),
        })
    }

    /// Creates OAuth client credentials.
    pub fn oauth(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::OAuthClient(ClientCredentials {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        })
    }

    /// Creates hashed-key credentials.
    pub fn hashed_key(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self::HashedKey(HashedKeyCredentials {
            key_id: key_id.into(),
            key_secret: SecretString::new(key_secret.into()),
        })
    }

    /// Creates session-token credentials.
    pub fn session_token(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::SessionToken(ClientCredentials {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        })
    }

    /// Creates a static sandbox token credential.
    pub fn sandbox(token: impl Into<String>) -> Self {
        Self::SandboxToken(SecretString::new(token.into()))
    }

    /// Short variant name for logging.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::LegacyApiKey(_) => "legacy_api_key",
            Self::OAuthClient(_) => "oauth_client",
            Self::HashedKey(_) => "hashed_key",
            Self::SessionToken(_) => "session_token",
            Self::SandboxToken(_) => "sandbox_token",
        }
    }

    /// Builds the login body for this credential at the given instant.
    pub fn login_payload(&self, now: DateTime<Utc>) -> ZscalerResult<LoginPayload> {
        match self {
            Self::LegacyApiKey(creds) => {
                let timestamp = u64::try_from(now.timestamp_millis()).map_err(|_| {
                    ZscalerError::credential("System clock is before the Unix epoch")
                })?;
                let obfuscated = obfuscate(creds.api_key.expose_secret(), timestamp)?;
                Ok(LoginPayload::Json(json!({
                    "apiKey": obfuscated.key,
                    "username": creds.username,
                    "password": creds.password.expose_secret(),
                    "timestamp": obfuscated.timestamp,
                })))
            }
            Self::OAuthClient(creds) => Ok(LoginPayload::Form(vec![
                ("client_id".to_string(), creds.client_id.clone()),
                (
                    "client_secret".to_string(),
                    creds.client_secret.expose_secret().clone(),
                ),
            ])),
            Self::HashedKey(creds) => Ok(LoginPayload::Json(hashed_key_login(
                &creds.key_id,
                creds.key_secret.expose_secret(),
                now.timestamp(),
            ))),
            Self::SessionToken(creds) => Ok(LoginPayload::Json(json!({
                "apiKey": creds.client_id,
                "secretKey": creds.client_secret.expose_secret(),
            }))),
            Self::SandboxToken(_) => Ok(LoginPayload::None),
        }
    }
}

/// Hex-encoded SHA-256 of `"<secret>:<epoch_secs>"`.
pub fn hash_key_secret(secret: &str, epoch_secs: i64) -> String {
    let digest = Sha256::digest(format!("{}:{}", secret, epoch_secs).as_bytes());
    hex::encode(digest)
}

/// Login body for hashed-key credentials.
pub fn hashed_key_login(key_id: &str, secret: &str, epoch_secs: i64) -> Value {
    json!({
        "key_id": key_id,
        "key_secret": hash_key_secret(secret, epoch_secs),
        "timestamp": epoch_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ZscalerErrorKind;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_legacy_login_rejects_pre_epoch_clock() {
        let credential = Credential::legacy("abcdef123456", "admin@example.com", "pw");
        let before_epoch = Utc.timestamp_opt(-1, 0).unwrap();

        let err = credential.login_payload(before_epoch).unwrap_err();
        assert_eq!(err.kind(), ZscalerErrorKind::Credential);
        assert!(credential.login_payload(fixed_now()).is_ok());
    }

    #[test]
    fn test_hashed_key_login() {
        let body = hashed_key_login("K", "S", 1_700_000_000);
        let expected = hex::encode(Sha256::digest(b"S:1700000000"));

        assert_eq!(body["key_id"], "K");
        assert_eq!(body["key_secret"], expected.as_str());
        assert_eq!(body["timestamp"], 1_700_000_000);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_legacy_payload_obfuscates_key() {
        let cred = Credential::legacy("abcdef123456", "admin@example.com", "pw");
        let LoginPayload::Json(body) = cred.login_payload(fixed_now()).unwrap() else {
            panic!("expected JSON payload");
        };

        assert_eq!(body["apiKey"], "aaaaaacccccc");
        assert_eq!(body["timestamp"], 1_700_000_000_000u64);
        assert_eq!(body["username"], "admin@example.com");
        assert_eq!(body["password"], "pw");
    }

    #[test]
    fn test_oauth_payload_is_form() {
        let cred = Credential::oauth("X", "Y");
        assert_eq!(
            cred.login_payload(fixed_now()).unwrap(),
            LoginPayload::Form(vec![
                ("client_id".to_string(), "X".to_string()),
                ("client_secret".to_string(), "Y".to_string()),
            ])
        );
    }

    #[test]
    fn test_session_token_payload() {
        let cred = Credential::session_token("id", "secret");
        let LoginPayload::Json(body) = cred.login_payload(fixed_now()).unwrap() else {
            panic!("expected JSON payload");
        };
        assert_eq!(body, json!({"apiKey": "id", "secretKey": "secret"}));
    }

    #[test]
    fn test_sandbox_has_no_login() {
        let cred = Credential::sandbox("tok");
        assert_eq!(cred.login_payload(fixed_now()).unwrap(), LoginPayload::None);
        assert_eq!(cred.variant_name(), "sandbox_token");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = Credential::legacy("abcdef123456", "admin", "hunter2");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("abcdef123456"));
    }
}
