//! Visitor identity strategies
//!
//! One [`IdentityStrategy`] is bound per deployment. Resolution order per
//! request: callback, then user model, then the `vanity_id` cookie, then a
//! freshly generated token. A strategy that yields nothing falls through to
//! the cookie.

use crate::context::RequestContext;
use crate::cookie::{SetCookie, DEFAULT_LIFETIME_MONTHS, IDENTITY_COOKIE};
use chrono::{DateTime, Utc};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use vanity_experiment::Identity;

/// Model whose primary key identifies the visitor
pub trait HasPrimaryKey {
    /// Primary key, stringified
    fn primary_key(&self) -> String;
}

macro_rules! primary_key_via_display {
    ($($ty:ty),*) => {
        $(impl HasPrimaryKey for $ty {
            fn primary_key(&self) -> String {
                self.to_string()
            }
        })*
    };
}

primary_key_via_display!(u32, u64, i32, i64, String, &str);

/// Per-request identity lookup bound into a strategy
pub type IdentityLookup = Arc<dyn Fn(&dyn RequestContext) -> Option<String> + Send + Sync>;

/// How the visitor identity is derived
#[derive(Clone, Default)]
pub enum IdentityStrategy {
    /// `vanity_id` cookie, generated when absent
    #[default]
    Cookie,
    /// Primary key of the current user, when there is one
    UserModel(IdentityLookup),
    /// Identity computed by the host
    Callback(IdentityLookup),
}

impl IdentityStrategy {
    /// Bind a current-user accessor
    pub fn user_model<U, F>(accessor: F) -> Self
    where
        U: HasPrimaryKey,
        F: Fn(&dyn RequestContext) -> Option<U> + Send + Sync + 'static,
    {
        Self::UserModel(Arc::new(move |ctx| {
            accessor(ctx).map(|user| user.primary_key())
        }))
    }

    /// Bind a callback whose result, stringified, is the identity
    pub fn callback<T, F>(callback: F) -> Self
    where
        T: Display,
        F: Fn(&dyn RequestContext) -> Option<T> + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(move |ctx| {
            callback(ctx).map(|identity| identity.to_string())
        }))
    }

    fn lookup(&self, ctx: &dyn RequestContext) -> Option<(String, IdentitySource)> {
        match self {
            Self::Cookie => None,
            Self::UserModel(lookup) => lookup(ctx).map(|id| (id, IdentitySource::UserModel)),
            Self::Callback(lookup) => lookup(ctx).map(|id| (id, IdentitySource::Callback)),
        }
    }
}

impl Debug for IdentityStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookie => f.write_str("Cookie"),
            Self::UserModel(_) => f.write_str("UserModel(..)"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Where a resolved identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Host callback
    Callback,
    /// Current user's primary key
    UserModel,
    /// Existing `vanity_id` cookie
    Cookie,
    /// Newly generated token
    Generated,
}

/// Identity for one request plus the cookie to send back, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Visitor identity
    pub identity: Identity,
    /// How it was obtained
    pub source: IdentitySource,
    /// `Set-Cookie` to attach to the response
    pub cookie: Option<SetCookie>,
}

/// Derives visitor identities from requests
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    strategy: IdentityStrategy,
    cookie_refresh: bool,
    lifetime_months: u32,
}

impl IdentityResolver {
    /// Create resolver with the given strategy
    #[inline]
    #[must_use]
    pub fn new(strategy: IdentityStrategy) -> Self {
        Self {
            strategy,
            cookie_refresh: false,
            lifetime_months: DEFAULT_LIFETIME_MONTHS,
        }
    }

    /// Re-issue an existing cookie with a fresh expiry on every request
    #[inline]
    #[must_use]
    pub fn with_cookie_refresh(mut self, refresh: bool) -> Self {
        self.cookie_refresh = refresh;
        self
    }

    /// Cookie lifetime in calendar months
    #[inline]
    #[must_use]
    pub fn with_cookie_lifetime(mut self, months: u32) -> Self {
        self.lifetime_months = months;
        self
    }

    /// Bound strategy
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> &IdentityStrategy {
        &self.strategy
    }

    /// Resolve the visitor identity for a request
    ///
    /// `now` anchors the cookie expiry.
    #[must_use]
    pub fn resolve(&self, ctx: &dyn RequestContext, now: DateTime<Utc>) -> ResolvedIdentity {
        if let Some((id, source)) = self.strategy.lookup(ctx).filter(|(id, _)| !id.is_empty()) {
            tracing::trace!("Identity {} from {:?}", id, source);
            return ResolvedIdentity {
                identity: Identity::new(id),
                source,
                cookie: None,
            };
        }

        if let Some(existing) = ctx.cookie(IDENTITY_COOKIE).filter(|v| !v.is_empty()) {
            let cookie = self
                .cookie_refresh
                .then(|| SetCookie::identity(existing.clone(), now, self.lifetime_months));
            return ResolvedIdentity {
                identity: Identity::new(existing),
                source: IdentitySource::Cookie,
                cookie,
            };
        }

        let identity = Identity::generate();
        tracing::debug!("Generated identity {}", identity);
        ResolvedIdentity {
            cookie: Some(SetCookie::identity(
                identity.as_str(),
                now,
                self.lifetime_months,
            )),
            identity,
            source: IdentitySource::Generated,
        }
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(IdentityStrategy::Cookie)
    }
}
