//! What the filter needs from the hosting web layer

use http::header::COOKIE;
use http::{Extensions, Method, Request};

/// Read access to one inbound request
pub trait RequestContext {
    /// Request method
    fn method(&self) -> &Method;

    /// Path without query
    fn path(&self) -> &str;

    /// Raw query string, without `?`
    fn query(&self) -> Option<&str>;

    /// Value of the named request cookie
    fn cookie(&self, name: &str) -> Option<String>;

    /// Typed per-request data, e.g. the authenticated user
    fn extensions(&self) -> Option<&Extensions> {
        None
    }
}

impl<B> RequestContext for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn path(&self) -> &str {
        self.uri().path()
    }

    fn query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| cookie_value(header, name))
    }

    fn extensions(&self) -> Option<&Extensions> {
        Some(Request::extensions(self))
    }
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`)
#[must_use]
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
    })
}
