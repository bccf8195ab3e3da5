//! Client cache policy: tell browsers how long they may keep static assets.
//!
//! [`CachePolicy`] sets an absolute `Expires` timestamp on successful
//! responses that are not HTML. Images, stylesheets, scripts and downloads are
//! versioned by path and safe to cache aggressively. HTML pages are the
//! mutable surface of a site and are left alone so content updates reach
//! visitors immediately.
//!
//! The policy can be applied to a subtree as a [`CacheConcern`] (built through
//! [`CacheConcernBuilder`]) or to the whole server as a
//! [`PolicyMiddleware`](crate::middleware::PolicyMiddleware).
//!
//! ## Configuration
//!
//! The cache lifetime is configurable in whole days, either in code or from
//! TOML via [`CacheConfig`]:
//!
//! ```toml
//! duration_days = 30
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::concern::{Concern, ConcernBuilder, ContentFactory, ResponsePolicy};
use crate::handler::{Handler, ParentRef};
use crate::http::response::latest_http_date;
use crate::http::{Request, Response, StatusCode};

/// Cache lifetime used when none is configured.
pub const DEFAULT_DURATION_DAYS: u32 = 7;

/// Longest cache lifetime accepted, about ten years.
pub const MAX_DURATION_DAYS: u32 = 3650;

/// Decides which successful responses may be cached.
pub type CachePredicate = Arc<dyn Fn(&Request, &Response) -> bool + Send + Sync>;

/// A concern applying [`CachePolicy`] to the subtree it wraps.
pub type CacheConcern = Concern<CachePolicy>;

/// Returns `true` unless the response is classified as HTML.
///
/// Responses without a (known) content type count as cacheable.
pub fn is_not_html(_request: &Request, response: &Response) -> bool {
    !response.get_content_type().is_some_and(|ct| ct.is_html())
}

/// Sets `Expires` to "now + duration" on cacheable `200 OK` responses.
///
/// A response is cacheable when its status is `200 OK` and the predicate
/// accepts it; the default predicate is [`is_not_html`]. The policy only ever
/// sets an expiry: responses it does not match keep whatever the handler put
/// there, including nothing.
///
/// # Examples
///
/// ```rust
/// use concerns::cache::CachePolicy;
/// use concerns::concern::ResponsePolicy;
/// use concerns::http::{ContentType, Request, Response, StatusCode};
///
/// let policy = CachePolicy::days(30);
///
/// let mut image = Response::new(StatusCode::Ok).content_type(ContentType::ImageJpeg);
/// policy.apply(&Request::get("/images/header.jpg"), &mut image);
/// assert!(image.get_expires().is_some());
///
/// let mut page = Response::new(StatusCode::Ok).content_type(ContentType::TextHtml);
/// policy.apply(&Request::get("/index.html"), &mut page);
/// assert!(page.get_expires().is_none());
/// ```
#[derive(Clone)]
pub struct CachePolicy {
    duration: TimeDelta,
    predicate: CachePredicate,
}

impl CachePolicy {
    /// A policy caching eligible responses for `days` days, at most
    /// [`MAX_DURATION_DAYS`].
    pub fn days(days: u32) -> Self {
        Self {
            duration: TimeDelta::days(i64::from(days.min(MAX_DURATION_DAYS))),
            predicate: Arc::new(is_not_html),
        }
    }

    /// Replaces the default "not HTML" check.
    ///
    /// The `200 OK` requirement still applies.
    #[must_use]
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request, &Response) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Returns how long eligible responses may be cached.
    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    /// Returns `true` if the policy would set an expiry on `response`.
    pub fn is_cacheable(&self, request: &Request, response: &Response) -> bool {
        response.status() == StatusCode::Ok && (self.predicate)(request, response)
    }

    /// The expiry this policy assigns to a response produced at `now`.
    ///
    /// Never later than the last representable HTTP-date.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let latest = latest_http_date();
        now.checked_add_signed(self.duration)
            .map_or(latest, |at| at.min(latest))
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::days(DEFAULT_DURATION_DAYS)
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl ResponsePolicy for CachePolicy {
    fn apply(&self, request: &Request, response: &mut Response) {
        if !self.is_cacheable(request, response) {
            return;
        }

        let expires = self.expiry_from(Utc::now());
        debug!(path = %request.path(), %expires, "client cache expiry set");
        response.set_expires(expires);
    }
}

/// Builds [`CacheConcern`]s, for mounting with
/// [`LayoutBuilder::concern`](crate::handler::LayoutBuilder::concern).
#[derive(Debug, Clone, Default)]
pub struct CacheConcernBuilder {
    policy: CachePolicy,
}

impl CacheConcernBuilder {
    /// A builder for concerns applying `policy`.
    pub fn new(policy: CachePolicy) -> Self {
        Self { policy }
    }

    /// Shorthand for `CacheConcernBuilder::new(CachePolicy::days(days))`.
    pub fn days(days: u32) -> Self {
        Self::new(CachePolicy::days(days))
    }

    /// Builds the concrete concern under `parent`.
    pub fn build_concern(&self, parent: ParentRef, content: ContentFactory<'_>) -> Arc<CacheConcern> {
        Concern::new(parent, self.policy.clone(), content)
    }
}

impl ConcernBuilder for CacheConcernBuilder {
    fn build(&self, parent: ParentRef, content: ContentFactory<'_>) -> Arc<dyn Handler> {
        self.build_concern(parent, content)
    }
}

/// Errors raised while loading a [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid cache configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cache duration must be between 1 and {max} days, got {days}", max = MAX_DURATION_DAYS)]
    InvalidDuration { days: u32 },
}

/// Cache settings as they appear in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Days a cacheable response stays fresh in the client.
    pub duration_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            duration_days: DEFAULT_DURATION_DAYS,
        }
    }
}

impl CacheConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Parse`]: the document is not valid TOML or has unknown keys.
    /// - [`ConfigError::InvalidDuration`]: `duration_days` is zero or above
    ///   [`MAX_DURATION_DAYS`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file. A file that does not exist yields the
    /// defaults; any other read failure is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml_str(&source),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Checks the values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DURATION_DAYS).contains(&self.duration_days) {
            return Err(ConfigError::InvalidDuration {
                days: self.duration_days,
            });
        }
        Ok(())
    }

    /// The policy these settings describe.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::days(self.duration_days)
    }
}

impl From<&CacheConfig> for CacheConcernBuilder {
    fn from(config: &CacheConfig) -> Self {
        Self::new(config.policy())
    }
}
