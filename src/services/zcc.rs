//! Client connector (ZCC).

use super::bind;
use crate::client::ServiceClient;
use crate::config::{Service, ZscalerConfig, ZscalerConfigBuilder};
use crate::errors::{ZscalerError, ZscalerResult};
use crate::pagination::{Dialect, ListParams, Paginator};
use crate::transport::{ApiRequest, ByteStream};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Client-connector client.
#[derive(Debug, Clone)]
pub struct ZccClient {
    client: ServiceClient,
}

impl ZccClient {
    /// Creates a client from configuration.
    pub fn new(config: ZscalerConfig) -> ZscalerResult<Self> {
        Ok(Self {
            client: bind(config, Service::ClientConnector)?,
        })
    }

    /// Creates a configuration builder.
    pub fn builder() -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(Service::ClientConnector)
    }

    /// Creates a client from `ZCC_*` environment variables.
    pub fn from_env() -> ZscalerResult<Self> {
        Self::new(Self::builder().build()?)
    }

    /// Enrolled devices.
    pub fn devices(&self) -> DevicesService<'_> {
        DevicesService {
            client: &self.client,
        }
    }
}

impl Deref for ZccClient {
    type Target = ServiceClient;

    fn deref(&self) -> &ServiceClient {
        &self.client
    }
}

/// Device operating system, as encoded in device queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsType {
    /// iOS.
    Ios,
    /// Android.
    Android,
    /// Windows.
    Windows,
    /// macOS.
    MacOs,
    /// Linux.
    Linux,
}

impl OsType {
    /// Numeric code sent on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ios => 1,
            Self::Android => 2,
            Self::Windows => 3,
            Self::MacOs => 4,
            Self::Linux => 5,
        }
    }
}

impl FromStr for OsType {
    type Err = ZscalerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(ZscalerError::configuration(format!(
                "Unknown OS type '{}'; expected one of ios, android, windows, macos, linux",
                other
            ))),
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        })
    }
}

/// Parses OS names, failing on the first unknown one.
pub fn parse_os_types<S: AsRef<str>>(names: &[S]) -> ZscalerResult<Vec<OsType>> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

/// ZCC devices.
pub struct DevicesService<'a> {
    client: &'a ServiceClient,
}

impl<'a> DevicesService<'a> {
    /// Lists devices (`username`, `os_type` filters pass through).
    pub fn list(&self, params: ListParams) -> Paginator<'a> {
        self.client
            .paginate("/public/v1/getDevices", Dialect::Page, params)
    }

    /// Streams the device inventory as CSV.
    ///
    /// The server allows three calls per day per tenant.
    pub async fn download(&self, os_types: &[OsType]) -> ZscalerResult<ByteStream> {
        let mut request = ApiRequest::get("/public/v1/downloadDevices").streaming();
        if !os_types.is_empty() {
            let codes: Vec<String> = os_types.iter().map(|os| os.code().to_string()).collect();
            request = request.query("osTypes", codes.join(","));
        }
        self.client.execute(request).await?.into_stream()
    }
}
