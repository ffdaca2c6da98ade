//! Internet access (ZIA).

use super::bind;
use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::ZscalerResult;
use crate::pagination::{Dialect, ListParams, Paginator};
use crate::types::Record;
use serde::Serialize;
use std::ops::Deref;

/// Internet-access client.
#[derive(Debug, Clone)]
pub struct ZiaClient {
    client: ServiceClient,
}

impl ZiaClient {
    /// Creates a client from configuration.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        Ok(Self {
            client: bind(config, Service::InternetAccess)?,
        })
    }

    /// Creates a configuration builder.
    pub fn builder() -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(Service::InternetAccess)
    }

    /// Creates a client from `ZIA_*` environment variables.
    pub fn from_env() -> ZscalerResult<Self> {
        Self::new(Self::builder().build()?)
    }

    /// User management.
    pub fn users(&self) -> UsersService<'_> {
        UsersService {
            client: &self.client,
        }
    }

    /// Configuration activation.
    pub fn activation(&self) -> ActivationService<'_> {
        ActivationService {
            client: &self.client,
        }
    }
}

impl Deref for ZiaClient {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}

/// ZIA users.
pub struct UsersService<'a> {
    client: &'a ServiceClient,
}

impl<'a> UsersService<'a> {
    /// Lists users (`search`, `dept`, `group` filters pass through).
    pub fn list(&self, params: ListParams) -> Paginator<'a> {
        self.client.paginate("/users", Dialect::Page, params)
    }

    /// Gets a user by id.
    pub async fn get(&self, user_id: u64) -> ZscalerResult<Record> {
        self.client.get(&format!("/users/{}", user_id)).await
    }

    /// Creates a user.
    pub async fn add<B: Serialize>(&self, user: &B) -> ZscalerResult<Record> {
        self.client.post("/users", user).await
    }

    /// Replaces a user.
    pub async fn update<B: Serialize>(&self, user_id: u64, user: &B) -> ZscalerResult<Record> {
        self.client.put(&format!("/users/{}", user_id), user).await
    }

    /// Deletes a user.
    pub async fn delete(&self, user_id: u64) -> ZscalerResult<()> {
        self.client.delete(&format!("/users/{}", user_id)).await
    }
}

/// ZIA configuration activation.
pub struct ActivationService<'a> {
    client: &'a ServiceClient,
}

impl ActivationService<'_> {
    /// Returns the pending-change status, e.g. `{"status": "PENDING"}`.
    pub async fn status(&self) -> ZscalerResult<Record> {
        self.client.get("/status").await
    }

    /// Activates pending configuration changes.
    pub async fn activate(&self) -> ZscalerResult<Record> {
        self.client
            .post("/status/activate", &serde_json::json!({}))
            .await
    }
}
