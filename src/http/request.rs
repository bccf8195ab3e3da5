//! HTTP/1.1 request heads, parsed with [`httparse`].

use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// The part of a request a handler tree routes on: method, path and headers.
///
/// Comes from [`Request::parse`] on the wire, or from [`Request::new`] when a
/// tree is driven directly. A query string is stripped from the path; no
/// handler in this crate looks at it. Request bodies are skipped by the
/// connection and never reach handlers.
///
/// # Examples
///
/// ```
/// use concerns::http::request::Request;
///
/// let raw = b"GET /images/header.jpg?v=2 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, head_len) = Request::parse(raw).unwrap();
///
/// assert_eq!(head_len, raw.len());
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/images/header.jpg");
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    // Minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// An HTTP/1.1 request for `target` with no headers.
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        Self {
            method,
            path: strip_query(target.as_ref()).to_owned(),
            version: 1,
            headers: Headers::new(),
        }
    }

    /// Shorthand for `Request::new(Method::Get, target)`.
    pub fn get(target: impl AsRef<str>) -> Self {
        Self::new(Method::Get, target)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Parses a request head from the start of `buf`.
    ///
    /// On success, also returns the length of the head, i.e. where the body
    /// (if any) starts. Header values that are not UTF-8 are dropped.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the blank line ending the head has
    /// arrived; [`RequestError::Parse`] or [`RequestError::MissingField`] for
    /// malformed input.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);

        let httparse::Status::Complete(head_len) = head.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        let method = match head.method {
            Some(name) => match name.parse::<Method>() {
                Ok(method) => method,
                Err(never) => match never {},
            },
            None => return Err(RequestError::MissingField { field: "method" }),
        };
        let target = head.path.ok_or(RequestError::MissingField { field: "path" })?;
        let version = head
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut headers = Headers::new();
        for field in head.headers.iter() {
            if let Ok(value) = std::str::from_utf8(field.value) {
                headers.insert(field.name, value);
            }
        }

        let request = Self {
            method,
            path: strip_query(target).to_owned(),
            version,
            headers,
        };
        Ok((request, head_len))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Whether the client wants the connection kept open after this exchange.
    ///
    /// An explicit `Connection` header decides; otherwise HTTP/1.1 keeps the
    /// connection and HTTP/1.0 closes it.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(value) => value.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// The declared body length, if the header is present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}

fn strip_query(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}
