//! Vanity Experiment - A/B test definitions and assignment engine
//!
//! The leaf crate of the workspace. It owns:
//! - [`Identity`]: the opaque per-visitor token assignments are keyed by
//! - [`Experiment`]: a validated, immutable A/B test with ordered [`Alternative`]s
//! - Consistent bucketing and override fingerprints ([`hash`])
//! - The [`Store`] abstraction plus an in-memory double ([`MemoryStore`])
//!
//! # Example
//!
//! ```rust,ignore
//! use vanity_experiment::{Experiment, ExperimentDefinition, Identity, MemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let experiment = Experiment::from_definition(
//!     ExperimentDefinition::new("pie_or_cake").with_alternatives(["pie", "cake"]),
//! )?;
//! let store = MemoryStore::new();
//! let visitor = Identity::new("visitor-1");
//!
//! let choice = experiment.choose(&store, &visitor).await?;
//! assert!(choice.is_fresh());
//! assert!(experiment.showing(&store, &visitor, choice.alternative()).await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod alternative;
pub mod error;
pub mod experiment;
pub mod hash;
pub mod identity;
pub mod memory;
pub mod metric;
pub mod store;

pub use alternative::Alternative;
pub use error::{ExperimentError, StoreError};
pub use experiment::{Choice, Experiment, ExperimentDefinition};
pub use identity::Identity;
pub use memory::MemoryStore;
pub use metric::MetricDefinition;
pub use store::{AlternativeCounts, Assignment, Store, StoreKind};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with experiments
    pub use crate::{
        Alternative, Choice, Experiment, ExperimentDefinition, ExperimentError, Identity,
        MemoryStore, MetricDefinition, Store, StoreError, StoreKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
