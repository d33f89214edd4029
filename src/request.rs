//! Plain value types describing a simulated request.
//!
//! These carry no connection to any networking crate: matching is structural
//! equality over the descriptor value, nothing more.

use std::collections::BTreeMap;
use std::fmt;

/// Method of a simulated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// The default method.
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        })
    }
}

/// Everything about a request besides its url: method, headers and body.
///
/// Equality is structural; headers compare by key/value set, independent of
/// insertion order. The default init is a GET with no headers and no body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestInit {
    method: Method,
    headers: BTreeMap<String, String>,
    body: Option<String>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Descriptor of one simulated request: a url plus its [`RequestInit`].
///
/// # Examples
///
/// ```
/// use flow_out::{Method, Request, RequestInit};
///
/// let request = Request::with_init(
///     "/items",
///     RequestInit::new().method(Method::Post).body("{\"x\":1}"),
/// );
/// assert_eq!(request.url(), "/items");
/// assert_eq!(request.method(), Method::Post);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: String,
    init: RequestInit,
}

impl Request {
    /// A request for `url` with the default init.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_init(url, RequestInit::default())
    }

    pub fn with_init(url: impl Into<String>, init: RequestInit) -> Self {
        Self {
            url: url.into(),
            init,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.init.method
    }

    pub fn init(&self) -> &RequestInit {
        &self.init
    }

    /// Whether this descriptor matches a lookup. The url must be equal; when
    /// criteria are given the whole init must be structurally equal as well.
    pub fn matches(&self, url: &str, init: Option<&RequestInit>) -> bool {
        self.url == url && init.map_or(true, |init| &self.init == init)
    }
}
