//! Digital experience (ZDX).

use super::bind;
use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::ZscalerResult;
use crate::pagination::{Dialect, ListParams, Paginator};
use crate::types::Record;
use std::ops::Deref;

/// Digital-experience client.
#[derive(Debug, Clone)]
pub struct ZdxClient {
    client: ServiceClient,
}

impl ZdxClient {
    /// Creates a client from configuration.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        Ok(Self {
            client: bind(config, Service::DigitalExperience)?,
        })
    }

    /// Creates a configuration builder.
    pub fn builder() -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(Service::DigitalExperience)
    }

    /// Creates a client from `ZDX_*` environment variables.
    pub fn from_env() -> ZscalerResult<Self> {
        Self::new(Self::builder().build()?)
    }

    /// Users seen by ZDX.
    pub fn users(&self) -> ZdxUsersService<'_> {
        ZdxUsersService {
            client: &self.client,
        }
    }

    /// Devices seen by ZDX.
    pub fn devices(&self) -> ZdxDevicesService<'_> {
        ZdxDevicesService {
            client: &self.client,
        }
    }
}

impl Deref for ZdxClient {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}

/// ZDX users.
pub struct ZdxUsersService<'a> {
    client: &'a ServiceClient,
}

impl<'a> ZdxUsersService<'a> {
    /// Lists users (`since`, `location_id`, `department_id` filters pass through).
    pub fn list(&self, params: ListParams) -> Paginator<'a> {
        self.client
            .paginate("/users", Dialect::offset("users"), params)
    }

    /// Gets a user by id.
    pub async fn get(&self, user_id: &str) -> ZscalerResult<Record> {
        self.client.get(&format!("/users/{}", user_id)).await
    }
}

/// ZDX devices.
pub struct ZdxDevicesService<'a> {
    client: &'a ServiceClient,
}

impl<'a> ZdxDevicesService<'a> {
    /// Lists devices.
    pub fn list(&self, params: ListParams) -> Paginator<'a> {
        self.client
            .paginate("/devices", Dialect::offset("devices"), params)
    }

    /// Gets a device by id.
    pub async fn get(&self, device_id: &str) -> ZscalerResult<Record> {
        self.client.get(&format!("/devices/{}", device_id)).await
    }
}
