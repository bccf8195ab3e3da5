//! Handler trees: the capability every node of the content hierarchy implements.
//!
//! A [`Handler`] can enumerate the content it would serve ([`Handler::content`])
//! and serve a request ([`Handler::handle`]). Handlers nest: every node owns its
//! children as `Arc<dyn Handler>` and keeps a non-owning [`ParentRef`] to the
//! node above it, so traversal can walk upwards without keeping anything alive.
//!
//! ## Core types
//!
//! - [`Handler`]: trait implemented by every node (layouts, resources, concerns).
//! - [`ParentRef`]: weak back-reference to a parent handler.
//! - [`HandlerBuilder`]: deferred construction of a handler once its parent is known.
//! - [`ContentElement`]: one entry of a handler's content enumeration.
//! - [`HandlerError`]: failures surfaced by `handle` and `prepare`.
//!
//! Two minimal node kinds are provided: [`Layout`] dispatches by path pattern,
//! [`Resource`] serves a single body.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Weak},
};

use thiserror::Error;

use crate::http::{ContentType, Request, Response};

pub mod layout;
pub mod resource;

pub use layout::{Layout, LayoutBuilder};
pub use resource::{Resource, ResourceBuilder};

/// Errors surfaced while preparing or handling a request.
///
/// Decorators never translate these; whatever the innermost handler returns
/// reaches the host unchanged.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The outcome of [`Handler::handle`]. `Ok(None)` means "not found here".
pub type HandlerResult = Result<Option<Response>, HandlerError>;

/// Boxed future returned by [`Handler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

/// Boxed future returned by [`Handler::prepare`].
pub type PrepareFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// Lazy enumeration returned by [`Handler::content`].
pub type ContentIter<'a> = Box<dyn Iterator<Item = ContentElement> + Send + 'a>;

/// A node in the handler tree.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; the tree is shared by every
///   connection task.
/// - `handle` **must not** mutate shared state; the tree is read-only once
///   serving begins.
/// - `content` returns a fresh iterator on every call.
pub trait Handler: Send + Sync {
    /// Returns the handler this node was built under, if it is still alive.
    fn parent(&self) -> Option<Arc<dyn Handler>>;

    /// Enumerates the content this handler could serve for `request`.
    ///
    /// Used for sitemaps and indexes. Relative element paths are resolved
    /// against the mount point by the enclosing [`Layout`].
    fn content<'a>(&'a self, request: &'a Request) -> ContentIter<'a>;

    /// Serves `request`.
    fn handle<'a>(&'a self, request: &'a Request) -> HandlerFuture<'a>;

    /// Performs expensive initialization before the first request.
    ///
    /// The host calls this once before serving. The default does nothing.
    fn prepare(&self) -> PrepareFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// A non-owning reference from a handler to the node above it.
///
/// Never keeps the parent alive. Upgrading fails at the root, after the parent
/// has been dropped, and while the parent is still being constructed.
#[derive(Clone, Default)]
pub struct ParentRef(Option<Weak<dyn Handler>>);

impl ParentRef {
    /// The reference held by the root of a tree.
    pub fn root() -> Self {
        Self(None)
    }

    /// Creates a reference to an existing handler.
    pub fn of(handler: &Arc<dyn Handler>) -> Self {
        Self(Some(Arc::downgrade(handler)))
    }

    /// Resolves the reference, if the parent is alive.
    pub fn upgrade(&self) -> Option<Arc<dyn Handler>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }

    /// Returns `true` if this is the root reference.
    pub fn is_root(&self) -> bool {
        self.0.is_none()
    }

    /// Returns `true` if this reference identifies `handler`.
    ///
    /// Compares addresses only, so it also works while the referenced handler
    /// is mid-construction.
    pub fn points_to(&self, handler: &Arc<dyn Handler>) -> bool {
        self.0
            .as_ref()
            .is_some_and(|weak| Weak::ptr_eq(weak, &Arc::downgrade(handler)))
    }
}

impl From<Weak<dyn Handler>> for ParentRef {
    fn from(weak: Weak<dyn Handler>) -> Self {
        Self(Some(weak))
    }
}

impl fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("ParentRef(root)"),
            Some(weak) => write!(f, "ParentRef({:p})", weak.as_ptr()),
        }
    }
}

/// Builds a handler once the parent it will live under is known.
///
/// Blanket-implemented for closures, so any
/// `Fn(ParentRef) -> Arc<dyn Handler>` can be mounted in a [`Layout`].
pub trait HandlerBuilder: Send + Sync {
    /// Constructs the handler as a child of `parent`.
    fn build(&self, parent: ParentRef) -> Arc<dyn Handler>;
}

impl<F> HandlerBuilder for F
where
    F: Fn(ParentRef) -> Arc<dyn Handler> + Send + Sync,
{
    fn build(&self, parent: ParentRef) -> Arc<dyn Handler> {
        (self)(parent)
    }
}

/// One entry of a content enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentElement {
    /// Absolute (`/docs/intro`) or relative to the enclosing mount point.
    pub path: String,
    pub title: Option<String>,
    pub content_type: Option<ContentType>,
}

impl ContentElement {
    /// Creates an element with no title.
    pub fn new(path: impl Into<String>, content_type: Option<ContentType>) -> Self {
        Self {
            path: path.into(),
            title: None,
            content_type,
        }
    }

    /// Sets the human-readable title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Resolves a relative path against `base`. Absolute paths are kept.
    #[must_use]
    pub fn resolve(mut self, base: &str) -> Self {
        if self.path.starts_with('/') {
            return self;
        }
        let base = base.trim_end_matches('/');
        self.path = match (base.is_empty(), self.path.is_empty()) {
            (true, true) => "/".to_owned(),
            (true, false) => format!("/{}", self.path),
            (false, true) => base.to_owned(),
            (false, false) => format!("{base}/{}", self.path),
        };
        self
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted handler for exercising decorators in tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Script = Box<dyn Fn(&Request) -> HandlerResult + Send + Sync>;

    /// Returns whatever its script says and counts `prepare` calls.
    pub(crate) struct Recorder {
        parent: ParentRef,
        script: Script,
        elements: Vec<ContentElement>,
        pub(crate) prepared: AtomicUsize,
        pub(crate) handled: AtomicUsize,
    }

    impl Recorder {
        pub(crate) fn new(
            parent: ParentRef,
            script: impl Fn(&Request) -> HandlerResult + Send + Sync + 'static,
        ) -> Self {
            Self {
                parent,
                script: Box::new(script),
                elements: Vec::new(),
                prepared: AtomicUsize::new(0),
                handled: AtomicUsize::new(0),
            }
        }

        /// A recorder that answers every request with a clone of `response`.
        pub(crate) fn responding(parent: ParentRef, response: Response) -> Self {
            Self::new(parent, move |_| Ok(Some(response.clone())))
        }

        pub(crate) fn with_elements(mut self, elements: Vec<ContentElement>) -> Self {
            self.elements = elements;
            self
        }

        pub(crate) fn parent_ref(&self) -> &ParentRef {
            &self.parent
        }
    }

    impl Handler for Recorder {
        fn parent(&self) -> Option<Arc<dyn Handler>> {
            self.parent.upgrade()
        }

        fn content<'a>(&'a self, _request: &'a Request) -> ContentIter<'a> {
            Box::new(self.elements.iter().cloned())
        }

        fn handle<'a>(&'a self, request: &'a Request) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.handled.fetch_add(1, Ordering::SeqCst);
                (self.script)(request)
            })
        }

        fn prepare(&self) -> PrepareFuture<'_> {
            Box::pin(async move {
                self.prepared.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }
}
