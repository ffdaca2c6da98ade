//! Cloud sandbox file submission.

use super::bind;
use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::ZscalerResult;
use crate::transport::ApiRequest;
use crate::types::Record;
use bytes::Bytes;
use std::ops::Deref;

const OCTET_STREAM: &str = "application/octet-stream";

/// Sandbox client; every request carries the `api_token` query parameter.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: ServiceClient,
}

impl SandboxClient {
    /// Creates a client from configuration.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        Ok(Self {
            client: bind(config, Service::Sandbox)?,
        })
    }

    /// Creates a configuration builder.
    pub fn builder() -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(Service::Sandbox)
    }

    /// Creates a client from `SANDBOX_TOKEN` and `ZIA_CLOUD`.
    pub fn from_env() -> ZscalerResult<Self> {
        Self::new(Self::builder().build()?)
    }

    /// Submits a file for analysis.
    ///
    /// With `force`, the file is analysed again even if its hash is known.
    pub async fn submit_file(&self, data: impl Into<Bytes>, force: bool) -> ZscalerResult<Record> {
        let request = ApiRequest::post("")
            .query("force", u8::from(force))
            .bytes(data, OCTET_STREAM);
        self.client.execute(request).await?.into_record()
    }
}

impl Deref for SandboxClient {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}
