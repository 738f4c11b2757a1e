//! Shared building blocks of permit-hub.
//!
//! - [`Config`] and [`PermitConfig`]: layered settings from TOML files and
//!   `PERMIT_HUB__*` environment variables
//! - [`AppError`]: the one error type every crate returns, rendered as JSON by axum
//! - [`IdGenerator`]: ULID row keys and `PRM-YYYYMMDD-XXXXXXXX` request codes
//! - [`StorageBackend`]: where rendered permit documents are written
//!
//! ```no_run
//! use permit_hub_common::{AppResult, Config, IdGenerator};
//!
//! fn request_code() -> AppResult<String> {
//!     let _config = Config::load()?;
//!     Ok(IdGenerator::new().generate_request_code(chrono::Utc::now()))
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::{Config, PermitConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{LocalStorage, StorageBackend, StorageConfig, StoredFile, permit_document_key};
