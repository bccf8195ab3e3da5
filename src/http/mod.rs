//! HTTP/1.1 protocol types and parsing.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`ContentType`], [`Headers`], [`Request`], and
//! [`Response`].

use std::fmt;

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;

/// An HTTP response status code.
///
/// # Examples
///
/// ```
/// use concerns::http::StatusCode;
///
/// let status = StatusCode::Ok;
/// assert_eq!(status.as_u16(), 200);
/// assert_eq!(status.canonical_reason(), "OK");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 1xx Informational
    Continue = 100,
    SwitchingProtocols = 101,

    // 2xx Success
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,
    PartialContent = 206,

    // 3xx Redirection
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    Conflict = 409,
    Gone = 410,
    LengthRequired = 411,
    PayloadTooLarge = 413,
    UriTooLong = 414,
    UnsupportedMediaType = 415,
    UnprocessableEntity = 422,
    TooManyRequests = 429,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
    HttpVersionNotSupported = 505,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Continue => "Continue",
            Self::SwitchingProtocols => "Switching Protocols",
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NoContent => "No Content",
            Self::PartialContent => "Partial Content",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::SeeOther => "See Other",
            Self::NotModified => "Not Modified",
            Self::TemporaryRedirect => "Temporary Redirect",
            Self::PermanentRedirect => "Permanent Redirect",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::Conflict => "Conflict",
            Self::Gone => "Gone",
            Self::LengthRequired => "Length Required",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::UriTooLong => "URI Too Long",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::UnprocessableEntity => "Unprocessable Entity",
            Self::TooManyRequests => "Too Many Requests",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::BadGateway => "Bad Gateway",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::GatewayTimeout => "Gateway Timeout",
            Self::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// An HTTP request method.
///
/// Standard methods are represented as unit variants for zero-cost comparison.
/// Non-standard methods are captured in the `Custom` variant.
///
/// # Examples
///
/// ```
/// use concerns::http::Method;
///
/// let method: Method = "GET".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET: retrieve a representation of the target resource.
    Get,
    /// POST: perform resource-specific processing on the request payload.
    Post,
    /// PUT: replace the target resource's current representation.
    Put,
    /// DELETE: remove the association between the target resource and its functionality.
    Delete,
    /// HEAD: identical to GET but without a response body.
    Head,
    /// OPTIONS: describe the communication options for the target resource.
    Options,
    /// PATCH: apply partial modifications to a resource.
    Patch,
    /// CONNECT: establish a tunnel to the server identified by the target resource.
    Connect,
    /// TRACE: perform a message loop-back test along the path to the target resource.
    Trace,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Custom(s) => s.as_str(),
        }
    }

}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            other => Self::Custom(other.to_owned()),
        })
    }
}

/// A media type the framework knows how to classify.
///
/// Responses carry an `Option<ContentType>`: `None` means the media type is
/// either absent or not one of the known kinds. Policies that only care about
/// "is this HTML?" can treat both cases the same way.
///
/// # Examples
///
/// ```
/// use concerns::http::ContentType;
///
/// let ct = ContentType::from_mime("text/html; charset=utf-8").unwrap();
/// assert!(ct.is_html());
/// assert_eq!(ContentType::from_extension("JPG"), Some(ContentType::ImageJpeg));
/// assert_eq!(ContentType::from_mime("application/x-unknown"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    TextHtml,
    TextCss,
    TextPlain,
    TextJavascript,
    TextXml,
    ApplicationJson,
    ApplicationPdf,
    ApplicationWasm,
    ApplicationOctetStream,
    ImageJpeg,
    ImagePng,
    ImageGif,
    ImageSvg,
    ImageWebp,
    ImageIcon,
    FontWoff,
    FontWoff2,
}

impl ContentType {
    /// Returns the canonical MIME type, with a UTF-8 charset for text kinds.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextHtml => "text/html; charset=utf-8",
            Self::TextCss => "text/css; charset=utf-8",
            Self::TextPlain => "text/plain; charset=utf-8",
            Self::TextJavascript => "text/javascript; charset=utf-8",
            Self::TextXml => "text/xml; charset=utf-8",
            Self::ApplicationJson => "application/json",
            Self::ApplicationPdf => "application/pdf",
            Self::ApplicationWasm => "application/wasm",
            Self::ApplicationOctetStream => "application/octet-stream",
            Self::ImageJpeg => "image/jpeg",
            Self::ImagePng => "image/png",
            Self::ImageGif => "image/gif",
            Self::ImageSvg => "image/svg+xml",
            Self::ImageWebp => "image/webp",
            Self::ImageIcon => "image/x-icon",
            Self::FontWoff => "font/woff",
            Self::FontWoff2 => "font/woff2",
        }
    }

    /// Returns `true` for `text/html`.
    pub fn is_html(self) -> bool {
        self == Self::TextHtml
    }

    /// Classifies a `Content-Type` header value.
    ///
    /// Parameters such as `charset` are ignored and the comparison is
    /// case-insensitive. Unknown media types yield `None`.
    pub fn from_mime(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim();

        let known = [
            ("text/html", Self::TextHtml),
            ("text/css", Self::TextCss),
            ("text/plain", Self::TextPlain),
            ("text/javascript", Self::TextJavascript),
            ("application/javascript", Self::TextJavascript),
            ("text/xml", Self::TextXml),
            ("application/xml", Self::TextXml),
            ("application/json", Self::ApplicationJson),
            ("application/pdf", Self::ApplicationPdf),
            ("application/wasm", Self::ApplicationWasm),
            ("application/octet-stream", Self::ApplicationOctetStream),
            ("image/jpeg", Self::ImageJpeg),
            ("image/png", Self::ImagePng),
            ("image/gif", Self::ImageGif),
            ("image/svg+xml", Self::ImageSvg),
            ("image/webp", Self::ImageWebp),
            ("image/x-icon", Self::ImageIcon),
            ("image/vnd.microsoft.icon", Self::ImageIcon),
            ("font/woff", Self::FontWoff),
            ("font/woff2", Self::FontWoff2),
        ];

        known
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
            .map(|(_, kind)| *kind)
    }

    /// Guesses the media type from a file extension (without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        let kind = match extension.to_ascii_lowercase().as_str() {
            "html" | "htm" => Self::TextHtml,
            "css" => Self::TextCss,
            "txt" | "md" => Self::TextPlain,
            "js" | "mjs" => Self::TextJavascript,
            "xml" => Self::TextXml,
            "json" => Self::ApplicationJson,
            "pdf" => Self::ApplicationPdf,
            "wasm" => Self::ApplicationWasm,
            "bin" | "zip" | "gz" => Self::ApplicationOctetStream,
            "jpg" | "jpeg" => Self::ImageJpeg,
            "png" => Self::ImagePng,
            "gif" => Self::ImageGif,
            "svg" => Self::ImageSvg,
            "webp" => Self::ImageWebp,
            "ico" => Self::ImageIcon,
            "woff" => Self::FontWoff,
            "woff2" => Self::FontWoff2,
            _ => return None,
        };
        Some(kind)
    }

}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
