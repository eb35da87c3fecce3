//! REST access to the portal backend: configuration, session persistence,
//! the authenticated HTTP client and process logging setup.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError, ConfigOverrides, SyncMode, SyncSettings};
pub use error::{ApiError, ApiResult};
pub use logging::{init_logging, LogGuard, LogOptions};
pub use session::{Session, SessionFile};
