//! Vanity Web - request integration
//!
//! Connects the playground to a web host through the [`RequestContext`]
//! contract (implemented for `http::Request<B>`):
//! - [`IdentityResolver`] derives the visitor identity from a callback, the
//!   current user, or the `vanity_id` cookie
//! - [`VanityFilter`] runs before handler dispatch and turns
//!   `?_vanity=<fingerprint>` on safe requests into an override plus a
//!   redirect without the parameter
//!
//! # Example
//!
//! ```rust,ignore
//! use vanity_core::Playground;
//! use vanity_web::{FilterOutcome, VanityFilter};
//!
//! # async fn example(playground: Playground, request: http::Request<()>) -> Result<(), Box<dyn std::error::Error>> {
//! let filter = VanityFilter::new(playground);
//! let outcome = filter.before(&request).await?;
//! if let Some(redirect) = outcome.redirect_response::<()>()? {
//!     // send `redirect` instead of dispatching
//! }
//! let session = outcome.into_session();
//! // dispatch, then `session.apply_to(response.headers_mut())?`
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod context;
pub mod cookie;
pub mod error;
pub mod filter;
pub mod identity;
pub mod session;

pub use context::RequestContext;
pub use cookie::{SetCookie, IDENTITY_COOKIE};
pub use error::FilterError;
pub use filter::{FilterOutcome, VanityFilter, OVERRIDE_PARAM};
pub use identity::{
    HasPrimaryKey, IdentityResolver, IdentitySource, IdentityStrategy, ResolvedIdentity,
};
pub use session::VisitorSession;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
