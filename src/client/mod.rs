//! Service client dispatcher.

use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::{ZscalerError, ZscalerResult};
use crate::keycase::KeyCaseTranslator;
use crate::pagination::{query_value, Dialect, ListParams, Paginator};
use crate::session::{Session, SessionState, SessionStatus};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

struct Inner {
    config: ZscalerConfig,
    transport: Transport,
    session: Session,
}

/// Authenticated client for one service tenant.
///
/// Cloning is cheap; clones share the session and connection pool. Calls on
/// one client are expected to be issued in order by a single caller.
#[derive(Clone)]
pub struct ServiceClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.inner.config.service)
            .field("base_url", &self.inner.config.base_url)
            .finish_non_exhaustive()
    }
}

impl ServiceClient {
    /// Creates a client. No request is sent until the first call.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        config.validate()?;

        let transport = Transport::new(&config)?;
        let session = Session::new(&config);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                session,
            }),
        })
    }

    /// Creates a configuration builder for `service`.
    pub fn builder(service: Service) -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(service)
    }

    /// Creates a client from environment variables alone.
    pub fn from_env(service: Service) -> ZscalerResult<Self> {
        Self::new(ZscalerConfigBuilder::new(service).build()?)
    }

    /// The client configuration.
    pub fn config(&self) -> &ZscalerConfig {
        &self.inner.config
    }

    /// The service family.
    pub fn service(&self) -> Service {
        self.inner.config.service
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    /// The key-case translator, including per-client overrides.
    pub fn translator(&self) -> &KeyCaseTranslator {
        self.inner.transport.translator()
    }

    /// Token that cancels every in-flight operation on this client.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.config.cancellation
    }

    // Session

    /// Logs in, replacing any existing session.
    pub async fn build_session(&self) -> ZscalerResult<()> {
        self.inner.session.build(&self.inner.transport).await
    }

    /// Asks the server for the session status.
    pub async fn session_status(&self) -> ZscalerResult<SessionStatus> {
        self.inner.session.status(&self.inner.transport).await
    }

    /// Validates or rebuilds the session.
    pub async fn refresh_session(&self) -> ZscalerResult<()> {
        self.inner.session.refresh(&self.inner.transport).await
    }

    /// Signs out and clears the session. Idempotent.
    pub async fn teardown(&self) -> ZscalerResult<()> {
        self.inner.session.teardown(&self.inner.transport).await
    }

    pub(crate) async fn teardown_if(&self, established_at: DateTime<Utc>) -> ZscalerResult<()> {
        self.inner
            .session
            .teardown_if(&self.inner.transport, established_at)
            .await
    }

    /// Snapshot of the live session, if any.
    pub async fn session_state(&self) -> Option<SessionState> {
        self.inner.session.current().await
    }

    /// Opens a session whose teardown is tied to the returned guard.
    pub async fn session(&self) -> ZscalerResult<SessionGuard> {
        let state = self.inner.session.ensure(&self.inner.transport).await?;
        Ok(SessionGuard {
            client: self.clone(),
            established_at: state.established_at(),
            closed: false,
        })
    }

    /// Runs `f` inside a session and tears it down on every exit path.
    ///
    /// A teardown failure is logged and never replaces the closure's result.
    /// If the returned future is dropped early, teardown runs on a spawned
    /// task.
    pub async fn with_session<F, Fut, T>(&self, f: F) -> ZscalerResult<T>
    where
        F: FnOnce(ServiceClient) -> Fut,
        Fut: Future<Output = ZscalerResult<T>>,
    {
        let guard = self.session().await?;
        let cancel = self.cancellation_token().clone();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ZscalerError::cancelled()),
            result = f(guard.client.clone()) => result,
        };

        if let Err(e) = guard.close().await {
            warn!(
                product = self.service().product(),
                error = %e,
                "Session teardown failed"
            );
        }
        result
    }

    // Requests

    /// Sends a request inside the session.
    pub async fn execute(&self, request: ApiRequest) -> ZscalerResult<ApiResponse> {
        let state = self.inner.session.ensure(&self.inner.transport).await?;
        self.inner
            .transport
            .send(state.api_base(), state.injection(), request)
            .await
    }

    /// Makes a GET request.
    pub async fn get(&self, path: &str) -> ZscalerResult<Record> {
        self.execute(ApiRequest::get(path)).await?.into_record()
    }

    /// Makes a GET request with snake_case query parameters.
    pub async fn get_with_params<P: Serialize>(
        &self,
        path: &str,
        params: &P,
    ) -> ZscalerResult<Record> {
        let mut request = ApiRequest::get(path);
        request.query = self.to_query(params)?;
        self.execute(request).await?.into_record()
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> ZscalerResult<Record> {
        let request = ApiRequest::post(path).json(serde_json::to_value(body)?);
        self.execute(request).await?.into_record()
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> ZscalerResult<Record> {
        let request = ApiRequest::put(path).json(serde_json::to_value(body)?);
        self.execute(request).await?.into_record()
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> ZscalerResult<Record> {
        let request = ApiRequest::patch(path).json(serde_json::to_value(body)?);
        self.execute(request).await?.into_record()
    }

    /// Makes a DELETE request.
    pub async fn delete(&self, path: &str) -> ZscalerResult<()> {
        self.execute(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Iterates a list endpoint.
    pub fn paginate(
        &self,
        path: impl Into<String>,
        dialect: Dialect,
        params: ListParams,
    ) -> Paginator<'_> {
        Paginator::new(self, path, dialect, params)
    }

    fn to_query<P: Serialize>(&self, params: &P) -> ZscalerResult<Vec<(String, String)>> {
        match serde_json::to_value(params)? {
            Value::Object(map) => Ok(map
                .iter()
                .filter_map(|(k, v)| query_value(v).map(|v| (self.translator().key_to_wire(k), v)))
                .collect()),
            Value::Null => Ok(Vec::new()),
            _ => Err(ZscalerError::configuration(
                "Query parameters must serialize to a mapping",
            )),
        }
    }
}

/// Scope guard for an open session.
///
/// Call [`SessionGuard::close`] to tear down and observe the result. A guard
/// dropped without closing tears down on a spawned task when a runtime is
/// available. Either way only the session the guard opened is torn down.
#[derive(Debug)]
pub struct SessionGuard {
    client: ServiceClient,
    established_at: DateTime<Utc>,
    closed: bool,
}

impl SessionGuard {
    /// The client the session belongs to.
    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Tears the session down.
    pub async fn close(mut self) -> ZscalerResult<()> {
        self.closed = true;
        self.client.teardown_if(self.established_at).await
    }
}

impl Deref for SessionGuard {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                product = self.client.service().product(),
                "Session guard dropped outside a runtime; teardown skipped"
            );
            return;
        };
        let client = self.client.clone();
        let established_at = self.established_at;
        handle.spawn(async move {
            if let Err(e) = client.teardown_if(established_at).await {
                warn!(error = %e, "Deferred session teardown failed");
            }
        });
    }
}
