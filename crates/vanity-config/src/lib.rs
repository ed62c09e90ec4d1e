//! Vanity Config - connection and load-path configuration
//!
//! Resolves where the store lives and where experiment definitions are read
//! from. Endpoint precedence is an explicit ordered cascade:
//!
//! ```text
//! explicit setting  →  <root>/config/redis.yml[environment]  →  localhost:6379
//! ```
//!
//! A missing file or a missing environment entry falls through to the next
//! source; only a malformed file is an error.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod definitions;
pub mod endpoint;
pub mod error;
pub mod paths;
pub mod resolver;

pub use definitions::{load_definitions, DefinitionSet};
pub use endpoint::StoreEndpoint;
pub use error::ConfigError;
pub use paths::{default_config_file, resolve_load_path, DEFAULT_LOAD_PATH};
pub use resolver::{EndpointOrigin, EndpointResolver, EndpointSource, ResolvedEndpoint};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
