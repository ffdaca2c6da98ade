//! Private access (ZPA).
//!
//! Resource paths resolve against the customer-scoped base set at login,
//! `<host>/mgmtconfig/v1/admin/customers/<customer_id>`.

use super::bind;
use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::ZscalerResult;
use crate::pagination::{Dialect, ListParams, Paginator};
use crate::types::Record;
use serde::Serialize;
use std::ops::Deref;

/// Private-access client.
#[derive(Debug, Clone)]
pub struct ZpaClient {
    client: ServiceClient,
}

impl ZpaClient {
    /// Creates a client from configuration.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        Ok(Self {
            client: bind(config, Service::PrivateAccess)?,
        })
    }

    /// Creates a configuration builder.
    pub fn builder() -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(Service::PrivateAccess)
    }

    /// Creates a client from `ZPA_*` environment variables.
    pub fn from_env() -> ZscalerResult<Self> {
        Self::new(Self::builder().build()?)
    }

    /// Segment groups.
    pub fn segment_groups(&self) -> SegmentGroupsService<'_> {
        SegmentGroupsService {
            client: &self.client,
        }
    }
}

impl Deref for ZpaClient {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}

/// ZPA segment groups.
pub struct SegmentGroupsService<'a> {
    client: &'a ServiceClient,
}

impl<'a> SegmentGroupsService<'a> {
    /// Lists segment groups.
    pub fn list(&self, params: ListParams) -> Paginator<'a> {
        self.client.paginate("/segmentGroup", Dialect::Page, params)
    }

    /// Gets a segment group by id.
    pub async fn get(&self, group_id: &str) -> ZscalerResult<Record> {
        self.client
            .get(&format!("/segmentGroup/{}", group_id))
            .await
    }

    /// Creates a segment group.
    pub async fn add<B: Serialize>(&self, group: &B) -> ZscalerResult<Record> {
        self.client.post("/segmentGroup", group).await
    }

    /// Updates a segment group; a no-content reply yields a null record.
    pub async fn update<B: Serialize>(&self, group_id: &str, group: &B) -> ZscalerResult<Record> {
        self.client
            .put(&format!("/segmentGroup/{}", group_id), group)
            .await
    }

    /// Deletes a segment group.
    pub async fn delete(&self, group_id: &str) -> ZscalerResult<()> {
        self.client
            .delete(&format!("/segmentGroup/{}", group_id))
            .await
    }
}
