//! `_vanity` override filter
//!
//! Runs before normal handler dispatch. On `GET`/`HEAD` requests carrying
//! `_vanity=<fingerprint>`, every token is applied as an override for the
//! visitor and the request is redirected to the same path without the
//! parameter. Other methods pass through untouched.

use crate::context::RequestContext;
use crate::error::FilterError;
use crate::identity::IdentityResolver;
use crate::session::VisitorSession;
use http::header::LOCATION;
use http::{Method, Response, StatusCode};
use url::form_urlencoded;
use vanity_core::Playground;

/// Query parameter carrying override fingerprints
pub const OVERRIDE_PARAM: &str = "_vanity";

/// What the host should do with the request
#[derive(Debug)]
pub enum FilterOutcome {
    /// Dispatch normally
    Continue(VisitorSession),
    /// Answer with a redirect to `location` instead
    Redirect {
        /// Path plus the remaining query
        location: String,
        /// Visitor state, including any pending cookie
        session: VisitorSession,
    },
}

impl FilterOutcome {
    /// Visitor state for the request
    #[inline]
    #[must_use]
    pub fn session(&self) -> &VisitorSession {
        match self {
            Self::Continue(session) | Self::Redirect { session, .. } => session,
        }
    }

    /// Consume into the visitor state
    #[inline]
    #[must_use]
    pub fn into_session(self) -> VisitorSession {
        match self {
            Self::Continue(session) | Self::Redirect { session, .. } => session,
        }
    }

    /// Whether the host should redirect
    #[inline]
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// Redirect target, if redirecting
    #[inline]
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location, .. } => Some(location),
            Self::Continue(_) => None,
        }
    }

    /// `302 Found` response carrying the pending cookie, if redirecting
    ///
    /// # Errors
    /// `FilterError` if the location or cookie is not a valid header.
    pub fn redirect_response<B: Default>(&self) -> Result<Option<Response<B>>, FilterError> {
        let Self::Redirect { location, session } = self else {
            return Ok(None);
        };
        let mut response = Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, location.as_str())
            .body(B::default())?;
        session.apply_to(response.headers_mut())?;
        Ok(Some(response))
    }
}

/// Request hook resolving the visitor and applying overrides
#[derive(Debug, Clone)]
pub struct VanityFilter {
    playground: Playground,
    resolver: IdentityResolver,
}

impl VanityFilter {
    /// Create filter using the cookie strategy
    #[inline]
    #[must_use]
    pub fn new(playground: Playground) -> Self {
        Self {
            playground,
            resolver: IdentityResolver::default(),
        }
    }

    /// With identity resolver
    #[inline]
    #[must_use]
    pub fn with_resolver(mut self, resolver: IdentityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Playground overrides are applied to
    #[inline]
    #[must_use]
    pub fn playground(&self) -> &Playground {
        &self.playground
    }

    /// Identity resolver in use
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Run before handler dispatch
    ///
    /// # Errors
    /// `FilterError::Vanity` if the store fails while applying an override.
    pub async fn before<C>(&self, ctx: &C) -> Result<FilterOutcome, FilterError>
    where
        C: RequestContext + Sync,
    {
        let session = VisitorSession::new(self.resolver.clone());
        let identity = session.identity(ctx).clone();

        if !is_safe(ctx.method()) {
            return Ok(FilterOutcome::Continue(session));
        }
        let Some(query) = ctx.query() else {
            return Ok(FilterOutcome::Continue(session));
        };

        let (tokens, remaining): (Vec<_>, Vec<_>) = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .partition(|(key, _)| key == OVERRIDE_PARAM);
        if tokens.is_empty() {
            return Ok(FilterOutcome::Continue(session));
        }

        for (_, token) in &tokens {
            match self.playground.force_fingerprint(&identity, token).await {
                Ok(Some((experiment, alternative))) => tracing::debug!(
                    "Override {} forced alternative {} of {}",
                    token,
                    alternative.index(),
                    experiment.id()
                ),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to apply override {}: {}", token, e);
                    return Err(e.into());
                }
            }
        }

        Ok(FilterOutcome::Redirect {
            location: redirect_location(ctx.path(), remaining),
            session,
        })
    }
}

fn is_safe(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Path plus the remaining pairs, stably sorted by key
///
/// The location is always origin-relative: leading runs of `/` or `\` collapse
/// to a single `/`, so `//host/path` cannot turn into a protocol-relative URL.
fn redirect_location(path: &str, mut remaining: Vec<(String, String)>) -> String {
    let path = format!("/{}", path.trim_start_matches(['/', '\\']));
    if remaining.is_empty() {
        return path;
    }
    remaining.sort_by(|a, b| a.0.cmp(&b.0));
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&remaining)
        .finish();
    format!("{path}?{query}")
}
