//! # Zscaler Integration Library
//!
//! Authenticated REST client core shared by the Zscaler service families:
//! - Per-tenant sessions for five credential variants (obfuscated API key,
//!   OAuth client, hashed key, session token, sandbox token)
//! - Transparent snake_case / camelCase key translation with an
//!   irregular-acronym override table
//! - Lazy pagination over numeric-page and offset-token list endpoints
//! - Retry with exponential backoff and `Retry-After` support
//! - Streaming downloads and binary/multipart uploads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_zscaler::{ListParams, ZiaClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads ZIA_API_KEY, ZIA_USERNAME, ZIA_PASSWORD and ZIA_CLOUD
//!     let zia = ZiaClient::from_env()?;
//!
//!     let session = zia.session().await?;
//!     let users = zia
//!         .users()
//!         .list(ListParams::new().max_items(50))
//!         .collect_all()
//!         .await?;
//!     session.close().await?;
//!
//!     for user in users {
//!         println!("{}", user.str("name").unwrap_or_default());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Key translation
pub mod keycase;

// Authentication
pub mod auth;
pub mod session;

// HTTP client and transport
pub mod client;
pub mod transport;

// Pagination handling
pub mod pagination;

// Service families
pub mod services;

// Resilience patterns
pub mod resilience;

// Observability
pub mod observability;

// Re-exports for convenience
pub use auth::{obfuscate, Credential, ObfuscatedKey};
pub use client::{ServiceClient, SessionGuard};
pub use config::{PoolConfig, RetryConfig, Service, ZscalerConfig, ZscalerConfigBuilder};
pub use errors::{ZscalerError, ZscalerErrorKind, ZscalerResult};
pub use keycase::{from_wire, to_wire, KeyCaseTranslator};
pub use pagination::{Dialect, ListParams, Paginator};
pub use resilience::RetryPolicy;
pub use services::{SandboxClient, ZccClient, ZconClient, ZdxClient, ZiaClient, ZpaClient};
pub use session::SessionStatus;
pub use transport::{ApiRequest, ApiResponse, ByteStream, MultipartBody};
pub use types::{RateLimitInfo, Record};
