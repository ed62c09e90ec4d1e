//! Per-request visitor state

use crate::context::RequestContext;
use crate::cookie::SetCookie;
use crate::identity::{IdentityResolver, ResolvedIdentity};
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, InvalidHeaderValue, SET_COOKIE};
use once_cell::sync::OnceCell;
use vanity_experiment::Identity;

/// Identity of the visitor behind one request
///
/// The identity is resolved on first access and memoized for the rest of the
/// request. Any cookie the resolution produced stays pending until the host
/// applies it to its response.
#[derive(Debug)]
pub struct VisitorSession {
    resolver: IdentityResolver,
    now: DateTime<Utc>,
    resolved: OnceCell<ResolvedIdentity>,
}

impl VisitorSession {
    /// Create session anchored at the current time
    #[inline]
    #[must_use]
    pub fn new(resolver: IdentityResolver) -> Self {
        Self::at(resolver, Utc::now())
    }

    /// Create session anchored at `now`
    #[inline]
    #[must_use]
    pub fn at(resolver: IdentityResolver, now: DateTime<Utc>) -> Self {
        Self {
            resolver,
            now,
            resolved: OnceCell::new(),
        }
    }

    /// Resolution result, computing it on first call
    pub fn resolve(&self, ctx: &dyn RequestContext) -> &ResolvedIdentity {
        self.resolved
            .get_or_init(|| self.resolver.resolve(ctx, self.now))
    }

    /// Visitor identity, computing it on first call
    pub fn identity(&self, ctx: &dyn RequestContext) -> &Identity {
        &self.resolve(ctx).identity
    }

    /// Resolution result, if already computed
    #[inline]
    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedIdentity> {
        self.resolved.get()
    }

    /// Cookie waiting to be sent
    #[inline]
    #[must_use]
    pub fn pending_cookie(&self) -> Option<&SetCookie> {
        self.resolved.get().and_then(|resolved| resolved.cookie.as_ref())
    }

    /// Append pending `Set-Cookie` headers to a response
    ///
    /// # Errors
    /// `InvalidHeaderValue` if a cookie cannot be rendered as a header.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        if let Some(cookie) = self.pending_cookie() {
            headers.append(SET_COOKIE, cookie.to_header_value()?);
        }
        Ok(())
    }
}
