//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses, the
//! in-place accessors that concerns and middleware use to decorate them, and
//! serialization to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, Utc};

use super::{ContentType, Headers, StatusCode};

/// IMF-fixdate, the preferred HTTP-date format (RFC 9110 §5.6.7).
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// The last instant an HTTP-date can express; its year has four digits.
///
/// Expiry timestamps past this point are written as this value.
pub fn latest_http_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|day| day.and_hms_opt(23, 59, 59))
        .map_or(DateTime::<Utc>::MAX_UTC, |at| at.and_utc())
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use concerns::http::{ContentType, Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .content_type(ContentType::ApplicationJson)
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Type: application/json\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    content_type: Option<ContentType>,
    expires: Option<DateTime<Utc>>,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            content_type: None,
            expires: None,
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place. Intended for middleware pipelines that receive
    /// a `Response` from downstream and need to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the media type of the body.
    ///
    /// Takes precedence over a raw `Content-Type` header when serializing.
    #[must_use]
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Sets the absolute time after which clients should consider the
    /// response stale.
    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Sets the expiry in-place.
    pub fn set_expires(&mut self, at: DateTime<Utc>) {
        self.expires = Some(at);
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers set so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Classifies the body's media type.
    ///
    /// Uses the typed value when one was set, otherwise parses a raw
    /// `Content-Type` header. Returns `None` when neither is present or the
    /// media type is not a known [`ContentType`].
    pub fn get_content_type(&self) -> Option<ContentType> {
        self.content_type.or_else(|| {
            self.headers
                .get("content-type")
                .and_then(ContentType::from_mime)
        })
    }

    /// Returns the expiry timestamp, if one was set.
    pub fn get_expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    /// Returns the body bytes.
    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type` from the typed value, replacing any raw header. When
    ///   neither is set and the body is non-empty, `text/plain; charset=utf-8`.
    /// - `Expires: <HTTP-date>` when an expiry was set, replacing any raw header.
    ///   Expiries beyond [`latest_http_date`] are written as that date.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if let Some(content_type) = self.content_type {
            self.headers.set("Content-Type", content_type.as_str());
        } else if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", ContentType::TextPlain.as_str());
        }

        if let Some(expires) = self.expires {
            let expires = expires.min(latest_http_date());
            self.headers
                .set("Expires", expires.format(HTTP_DATE_FORMAT).to_string());
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}
