//! Error types for request integration

use vanity_core::VanityError;

/// Errors raised while filtering a request
///
/// Unknown `_vanity` tokens are never an error.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// Playground or store failed while applying an override
    #[error(transparent)]
    Vanity(#[from] VanityError),

    /// A header could not be rendered
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The redirect response could not be built
    #[error("failed to build response: {0}")]
    Http(#[from] http::Error),
}
