//! Path-pattern dispatch: mount child handlers under URL patterns.
//!
//! A [`Layout`] is the branching node of a handler tree. Two pattern styles are
//! supported:
//!
//! | Pattern      | Example match              |
//! |--------------|----------------------------|
//! | `/legal`     | `/legal`                   |
//! | `/images/*`  | `/images/header.jpg`       |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so
//! `/legal/` and `/legal` are treated as equivalent. Patterns match the full
//! request path, so nested layouts mount their routes with absolute patterns.
//!
//! Routes are matched in registration order; the first route whose pattern
//! matches wins, and its answer (including "not found") is final.

use std::sync::{Arc, Weak};

use tracing::debug;

use super::{
    ContentIter, Handler, HandlerBuilder, HandlerFuture, ParentRef, PrepareFuture,
};
use crate::concern::{ConcernBuilder, apply_concerns};
use crate::http::Request;

// Compiled representation of a route pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    // Matches one exact path string, e.g. `/legal`.
    Exact(String),
    // Matches the prefix itself and anything below it, e.g. `/images/*`.
    Prefix(String),
}

impl Pattern {
    // A trailing slash (other than on the root `/`) is stripped before
    // classification so that `/legal/` and `/legal` compile to the same pattern.
    fn parse(pattern: &str) -> Self {
        let pattern = normalize(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Prefix(prefix.to_string());
        }
        if pattern == "*" {
            return Pattern::Prefix(String::new());
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> bool {
        let path = normalize(path);

        match self {
            Pattern::Exact(p) => p == path,
            Pattern::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }

    // Where relative content elements of the mounted handler resolve to.
    fn mount_point(&self) -> &str {
        match self {
            Pattern::Exact(p) | Pattern::Prefix(p) => p,
        }
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A mounted child handler.
struct Route {
    pattern: Pattern,
    handler: Arc<dyn Handler>,
}

/// Dispatches requests to child handlers by path pattern.
///
/// Built through [`LayoutBuilder`]; every child is constructed with the layout
/// as its parent.
pub struct Layout {
    parent: ParentRef,
    routes: Vec<Route>,
}

impl Layout {
    /// Returns the number of mounted routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are mounted.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the child mounted under the first route matching `path`.
    pub fn child_for(&self, path: &str) -> Option<&Arc<dyn Handler>> {
        self.routes
            .iter()
            .find(|route| route.pattern.matches(path))
            .map(|route| &route.handler)
    }
}

impl Handler for Layout {
    fn parent(&self) -> Option<Arc<dyn Handler>> {
        self.parent.upgrade()
    }

    fn content<'a>(&'a self, request: &'a Request) -> ContentIter<'a> {
        Box::new(self.routes.iter().flat_map(move |route| {
            let base = route.pattern.mount_point();
            route
                .handler
                .content(request)
                .map(move |element| element.resolve(base))
        }))
    }

    fn handle<'a>(&'a self, request: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            match self.child_for(request.path()) {
                Some(child) => child.handle(request).await,
                None => {
                    debug!(path = %request.path(), "no route matched");
                    Ok(None)
                }
            }
        })
    }

    fn prepare(&self) -> PrepareFuture<'_> {
        Box::pin(async move {
            for route in &self.routes {
                route.handler.prepare().await?;
            }
            Ok(())
        })
    }
}

/// Collects routes and concerns for a [`Layout`].
///
/// # Examples
///
/// ```rust
/// use concerns::cache::CacheConcernBuilder;
/// use concerns::handler::{HandlerBuilder, LayoutBuilder, ParentRef, Resource};
/// use concerns::http::ContentType;
///
/// let site = LayoutBuilder::new()
///     .route("/", Resource::bytes("<h1>Home</h1>", ContentType::TextHtml))
///     .route("/images/*", Resource::bytes(vec![0xff, 0xd8], ContentType::ImageJpeg))
///     .concern(CacheConcernBuilder::days(30));
///
/// let root = site.build(ParentRef::root());
/// assert!(root.parent().is_none());
/// ```
#[derive(Default)]
pub struct LayoutBuilder {
    routes: Vec<(String, Box<dyn HandlerBuilder>)>,
    concerns: Vec<Box<dyn ConcernBuilder>>,
}

impl LayoutBuilder {
    /// Creates a builder with no routes and no concerns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts the handler produced by `handler` under `pattern`.
    #[must_use]
    pub fn route(mut self, pattern: &str, handler: impl HandlerBuilder + 'static) -> Self {
        self.routes.push((pattern.to_owned(), Box::new(handler)));
        self
    }

    /// Wraps the layout in `concern`. The first concern added is outermost.
    #[must_use]
    pub fn concern(mut self, concern: impl ConcernBuilder + 'static) -> Self {
        self.concerns.push(Box::new(concern));
        self
    }

    // Builds the bare layout; its children see it as their parent.
    fn build_layout(&self, parent: ParentRef) -> Arc<Layout> {
        Arc::new_cyclic(|me: &Weak<Layout>| {
            let me: Weak<dyn Handler> = me.clone();
            let me = ParentRef::from(me);
            let routes = self
                .routes
                .iter()
                .map(|(pattern, builder)| Route {
                    pattern: Pattern::parse(pattern),
                    handler: builder.build(me.clone()),
                })
                .collect();
            Layout { parent, routes }
        })
    }
}

impl HandlerBuilder for LayoutBuilder {
    fn build(&self, parent: ParentRef) -> Arc<dyn Handler> {
        apply_concerns(&self.concerns, parent, &|inner: ParentRef| -> Arc<dyn Handler> {
            self.build_layout(inner)
        })
    }
}
