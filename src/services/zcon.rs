//! Cloud and branch connector (ZCON).

use super::bind;
use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::ZscalerResult;
use crate::pagination::{Dialect, ListParams, Paginator};
use crate::types::Record;
use std::ops::Deref;

/// Branch-connector client.
#[derive(Debug, Clone)]
pub struct ZconClient {
    client: ServiceClient,
}

impl ZconClient {
    /// Creates a client from configuration.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        Ok(Self {
            client: bind(config, Service::BranchConnector)?,
        })
    }

    /// Creates a configuration builder.
    pub fn builder() -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(Service::BranchConnector)
    }

    /// Creates a client from `ZCON_*` environment variables.
    pub fn from_env() -> ZscalerResult<Self> {
        Self::new(Self::builder().build()?)
    }

    /// Locations.
    pub fn locations(&self) -> LocationsService<'_> {
        LocationsService {
            client: &self.client,
        }
    }

    /// Admin actions.
    pub fn admin(&self) -> AdminService<'_> {
        AdminService {
            client: &self.client,
        }
    }
}

impl Deref for ZconClient {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}

/// ZCON locations.
pub struct LocationsService<'a> {
    client: &'a ServiceClient,
}

impl<'a> LocationsService<'a> {
    /// Lists locations.
    pub fn list(&self, params: ListParams) -> Paginator<'a> {
        self.client.paginate("/location", Dialect::Page, params)
    }

    /// Gets a location by id.
    pub async fn get(&self, location_id: u64) -> ZscalerResult<Record> {
        self.client
            .get(&format!("/location/{}", location_id))
            .await
    }
}

/// ZCON admin actions.
pub struct AdminService<'a> {
    client: &'a ServiceClient,
}

impl AdminService<'_> {
    /// Activation status of pending edits.
    pub async fn activation_status(&self) -> ZscalerResult<Record> {
        self.client.get("/ecAdminActivateStatus").await
    }

    /// Activates pending edits.
    pub async fn activate(&self) -> ZscalerResult<Record> {
        self.client
            .put("/ecAdminActivateStatus/activate", &serde_json::json!({}))
            .await
    }
}
