//! Session lifecycle for one service tenant.
//!
//! A [`Session`] performs the login handshake for its credential variant,
//! keeps the resulting token and its injection mode, and hands both to the
//! transport for every later request. State lives behind a `tokio` mutex, so
//! concurrent first requests wait for a single login.

use crate::auth::{Credential, LoginPayload};
use crate::config::{Service, ZscalerConfig};
use crate::errors::{ZscalerError, ZscalerErrorKind, ZscalerResult};
use crate::observability::TracingHooks;
use crate::resilience::RetryPolicy;
use crate::transport::{ApiRequest, Injection, Transport};
use crate::types::Record;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, SET_COOKIE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::Mutex;

/// Tokens this close to expiry are replaced before the next request.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Query parameter carrying the sandbox token.
pub const SANDBOX_TOKEN_PARAM: &str = "api_token";

/// Credential material and routing captured by a successful login.
#[derive(Debug, Clone)]
pub struct SessionState {
    injection: Option<Injection>,
    api_base: String,
    expires_at: Option<DateTime<Utc>>,
    established_at: DateTime<Utc>,
}

impl SessionState {
    /// How the token is attached to requests.
    pub fn injection(&self) -> Option<&Injection> {
        self.injection.as_ref()
    }

    /// Base URL resource paths resolve against.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Expiry reported by the server, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// When the login completed.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }
}

/// Authentication state as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// The server confirmed the session; carries its status body.
    Active(Record),
    /// No session, or the server rejected it.
    Inactive,
    /// The service has no status endpoint.
    Unknown,
}

/// Session controller for one tenant.
#[derive(Debug)]
pub struct Session {
    service: Service,
    credential: Credential,
    base_url: String,
    customer_id: Option<String>,
    state: Mutex<Option<SessionState>>,
}

impl Session {
    /// Creates an idle session; nothing is sent until the first request.
    pub fn new(config: &ZscalerConfig) -> Self {
        Self {
            service: config.service,
            credential: config.credential.clone(),
            base_url: config.base_url.clone(),
            customer_id: config.customer_id.clone(),
            state: Mutex::new(None),
        }
    }

    /// Service this session authenticates against.
    pub fn service(&self) -> Service {
        self.service
    }

    /// Returns true when a login has completed and not been torn down.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Snapshot of the current state, if any.
    pub async fn current(&self) -> Option<SessionState> {
        self.state.lock().await.clone()
    }

    /// Performs the login handshake, replacing any existing state.
    pub async fn build(&self, transport: &Transport) -> ZscalerResult<()> {
        let mut guard = self.state.lock().await;
        *guard = Some(self.login(transport).await?);
        Ok(())
    }

    /// Returns live session state, logging in first when there is none or
    /// the token is about to expire.
    pub async fn ensure(&self, transport: &Transport) -> ZscalerResult<SessionState> {
        let mut guard = self.state.lock().await;
        match guard.as_ref() {
            Some(state) if !state.is_stale(Utc::now()) => Ok(state.clone()),
            _ => {
                let state = self.login(transport).await?;
                *guard = Some(state.clone());
                Ok(state)
            }
        }
    }

    /// Asks the server for the session status.
    pub async fn status(&self, transport: &Transport) -> ZscalerResult<SessionStatus> {
        let Some(path) = self.service.session_endpoints().status else {
            return Ok(SessionStatus::Unknown);
        };
        let Some(state) = self.current().await else {
            return Ok(SessionStatus::Inactive);
        };

        let request = ApiRequest::get(path).retry(RetryPolicy::none());
        match transport
            .send(&self.base_url, state.injection(), request)
            .await
        {
            Ok(response) => Ok(SessionStatus::Active(response.into_record()?)),
            Err(e) if matches!(e.status_code(), Some(401) | Some(403)) => {
                Ok(SessionStatus::Inactive)
            }
            Err(e) => Err(e),
        }
    }

    /// Validates the session where the service supports it; rebuilds otherwise.
    pub async fn refresh(&self, transport: &Transport) -> ZscalerResult<()> {
        let mut guard = self.state.lock().await;

        if self.service == Service::DigitalExperience {
            if let (Some(state), Some(path)) =
                (guard.as_ref(), self.service.session_endpoints().status)
            {
                let request = ApiRequest::get(path).retry(RetryPolicy::none());
                if transport
                    .send(&self.base_url, state.injection(), request)
                    .await
                    .is_ok()
                {
                    TracingHooks::on_session_refresh(self.service.product(), false);
                    return Ok(());
                }
            }
        }

        *guard = None;
        let state = self.login(transport).await.map_err(|e| {
            if e.kind() == ZscalerErrorKind::Cancelled {
                e
            } else {
                e.into_kind(ZscalerErrorKind::Authentication)
            }
        })?;
        *guard = Some(state);
        TracingHooks::on_session_refresh(self.service.product(), true);
        Ok(())
    }

    /// Clears local state and signs out remotely where supported.
    ///
    /// Safe to call any number of times. A logout the server answers with
    /// 401, 403 or 404 means the session was already gone and counts as done.
    pub async fn teardown(&self, transport: &Transport) -> ZscalerResult<()> {
        let Some(state) = self.state.lock().await.take() else {
            return Ok(());
        };
        self.logout(transport, state).await
    }

    /// Tears down only when the live session is the one established at
    /// `established_at`. A session built since then is left alone.
    pub async fn teardown_if(
        &self,
        transport: &Transport,
        established_at: DateTime<Utc>,
    ) -> ZscalerResult<()> {
        let state = {
            let mut guard = self.state.lock().await;
            let opened_here = guard
                .as_ref()
                .is_some_and(|state| state.established_at == established_at);
            if opened_here {
                guard.take()
            } else {
                None
            }
        };
        match state {
            Some(state) => self.logout(transport, state).await,
            None => Ok(()),
        }
    }

    async fn logout(&self, transport: &Transport, state: SessionState) -> ZscalerResult<()> {
        let product = self.service.product();
        let Some(path) = self.service.session_endpoints().logout else {
            TracingHooks::on_session_teardown(product, false);
            return Ok(());
        };

        let request = ApiRequest::delete(path).retry(RetryPolicy::none());
        match transport
            .send(&self.base_url, state.injection(), request)
            .await
        {
            Ok(_) => {
                TracingHooks::on_session_teardown(product, true);
                Ok(())
            }
            Err(e) if matches!(e.status_code(), Some(401) | Some(403) | Some(404)) => {
                TracingHooks::on_session_already_closed(product, &e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn login(&self, transport: &Transport) -> ZscalerResult<SessionState> {
        let now = Utc::now();
        let endpoints = self.service.session_endpoints();

        let Some(path) = endpoints.login else {
            let injection = match self.credential {
                Credential::SandboxToken(ref token) => Some(Injection::Query {
                    name: SANDBOX_TOKEN_PARAM.to_string(),
                    value: token.clone(),
                }),
                _ => None,
            };
            return Ok(SessionState {
                injection,
                api_base: self.base_url.clone(),
                expires_at: None,
                established_at: now,
            });
        };

        let request = match self.credential.login_payload(now)? {
            LoginPayload::Json(body) => ApiRequest::post(path).json(body).verbatim_body(),
            LoginPayload::Form(pairs) => ApiRequest::post(path).form(pairs),
            LoginPayload::None => ApiRequest::post(path),
        };

        let response = transport
            .send(&self.base_url, None, request)
            .await
            .map_err(|e| {
                if e.status_code().is_some() {
                    e.into_kind(ZscalerErrorKind::Authentication)
                } else {
                    e
                }
            })?;

        let cookies = cookie_header(response.headers());
        let record = response.into_record()?;

        let injection = match self.credential {
            Credential::LegacyApiKey(_) => {
                let cookies = cookies.ok_or_else(|| {
                    ZscalerError::authentication("Login response carried no session cookie")
                        .with_path(path)
                })?;
                Injection::Cookie(SecretString::new(cookies))
            }
            Credential::OAuthClient(_) => {
                Injection::Bearer(token_field(&record, "access_token", path)?)
            }
            Credential::HashedKey(_) => Injection::Bearer(token_field(&record, "token", path)?),
            Credential::SessionToken(_) => {
                Injection::AuthToken(token_field(&record, "jwt_token", path)?)
            }
            Credential::SandboxToken(ref token) => Injection::Query {
                name: SANDBOX_TOKEN_PARAM.to_string(),
                value: token.clone(),
            },
        };

        let api_base = match (self.service, self.customer_id.as_deref()) {
            (Service::PrivateAccess, Some(customer_id)) => format!(
                "{}/mgmtconfig/v1/admin/customers/{}",
                self.base_url.trim_end_matches('/'),
                customer_id
            ),
            _ => self.base_url.clone(),
        };

        TracingHooks::on_session_built(self.service.product(), self.credential.variant_name());

        Ok(SessionState {
            injection: Some(injection),
            api_base,
            expires_at: expires_in(&record).map(|secs| now + ChronoDuration::seconds(secs)),
            established_at: now,
        })
    }
}

fn token_field(record: &Record, key: &str, path: &str) -> ZscalerResult<SecretString> {
    record
        .str(key)
        .filter(|t| !t.is_empty())
        .map(|t| SecretString::new(t.to_string()))
        .ok_or_else(|| {
            ZscalerError::authentication(format!("Login response missing '{}'", key))
                .with_path(path)
        })
}

fn expires_in(record: &Record) -> Option<i64> {
    match record.get("expires_in") {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Joins the `name=value` pairs of every `Set-Cookie` header.
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
