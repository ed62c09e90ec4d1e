//! Vanity Core - the experiment playground
//!
//! [`Playground`] owns:
//! - the experiment and metric registries
//! - the load path definitions are read from
//! - the active [`Store`](vanity_experiment::Store): Redis by default, the
//!   in-memory double after [`Playground::use_test_store`]
//!
//! Handles are cheap to clone and meant to be passed explicitly. The
//! [`global`] module keeps one process-wide instance for hosts that need
//! ambient lookup.
//!
//! # Example
//!
//! ```rust,ignore
//! use vanity_core::{Playground, PlaygroundConfig};
//! use vanity_experiment::{ExperimentDefinition, Identity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let playground = Playground::new(PlaygroundConfig::new().with_test_mode(true));
//! let experiment = playground.register_experiment(
//!     ExperimentDefinition::new("pie_or_cake").with_alternatives(["pie", "cake"]),
//! )?;
//!
//! let choice = experiment.choose(&Identity::generate()).await?;
//! println!("showing {}", choice.alternative());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod global;
pub mod handle;
pub mod playground;

pub use config::{PlaygroundConfig, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_ENVIRONMENT};
pub use error::VanityError;
pub use handle::ExperimentHandle;
pub use playground::Playground;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the playground
    pub use crate::{ExperimentHandle, Playground, PlaygroundConfig, VanityError};
    pub use vanity_experiment::{
        Alternative, Choice, ExperimentDefinition, Identity, MetricDefinition, StoreKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
