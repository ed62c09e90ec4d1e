//! The `vanity_id` identity cookie

use chrono::{DateTime, Duration, Months, Utc};
use http::header::{HeaderValue, InvalidHeaderValue};
use std::fmt::{self, Display, Formatter};

/// Name of the identity cookie
pub const IDENTITY_COOKIE: &str = "vanity_id";

/// Default lifetime of the identity cookie, in calendar months
pub const DEFAULT_LIFETIME_MONTHS: u32 = 1;

/// Outbound `Set-Cookie` instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    expires: DateTime<Utc>,
    path: String,
}

impl SetCookie {
    /// Identity cookie for `value`, expiring `months` calendar months after `now`
    #[must_use]
    pub fn identity(value: impl Into<String>, now: DateTime<Utc>, months: u32) -> Self {
        let expires = now
            .checked_add_months(Months::new(months))
            .unwrap_or_else(|| now + Duration::days(30 * i64::from(months)));
        Self {
            name: IDENTITY_COOKIE.to_string(),
            value: value.into(),
            expires,
            path: "/".to_string(),
        }
    }

    /// Cookie name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry instant
    #[inline]
    #[must_use]
    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// Cookie path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rendered as a header value
    ///
    /// # Errors
    /// `InvalidHeaderValue` if the value holds characters not allowed in a
    /// header.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

impl Display for SetCookie {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; expires={}; path={}",
            self.name,
            self.value,
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
            self.path
        )
    }
}
