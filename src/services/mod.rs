//! Per-family clients and their resource namespaces.
//!
//! Each family client wraps a [`ServiceClient`] bound to that service and
//! hands out borrowed namespace handles. Creating a handle sends nothing.

mod sandbox;
mod zcc;
mod zcon;
mod zdx;
mod zia;
mod zpa;

pub use sandbox::*;
pub use zcc::*;
pub use zcon::*;
pub use zdx::*;
pub use zia::*;
pub use zpa::*;

use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig};
use crate::errors::{ZscalerError, ZscalerResult};

/// Creates a client for `config`, rejecting configurations for another family.
pub(crate) fn bind(config: ZscalerConfig, expected: Service) -> ZscalerResult<ServiceClient> {
    if config.service != expected {
        return Err(ZscalerError::configuration(format!(
            "Configuration is for {}, expected {}",
            config.service, expected
        )));
    }
    ServiceClient::new(config)
}
