//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → EtcdClient::from_config builds pool, dispatcher and runtime
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a new client is built for new settings
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{CallbackMode, ClientConfig, DispatchConfig, ObservabilityConfig, RuntimeConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
