//! Concerns: decorators that wrap a handler to apply cross-cutting policy.
//!
//! A [`Concern`] sits between a parent handler and the content handler it
//! wraps. It forwards everything to the wrapped handler and, on the way back
//! up, gives its [`ResponsePolicy`] a chance to decorate the response. Because
//! a concern is itself a [`Handler`], concerns nest and can be mounted anywhere
//! a handler can.
//!
//! ## Construction order
//!
//! The wrapped handler must see the concern, not the concern's parent, as its
//! own parent. Otherwise upward traversal from inside the subtree would skip the
//! decorator. The concern therefore has to exist before its content does:
//! [`Concern::new`] allocates the concern with [`Arc::new_cyclic`] and hands a
//! [`ParentRef`] to the still-unfinished concern to the content factory. That
//! reference cannot be upgraded until construction completes, so the factory
//! can store it but never call through it.
//!
//! ## Deferred construction
//!
//! [`ConcernBuilder`] lets tree assembly code decide *which* concern to apply
//! separately from *where* it is applied: the builder receives the parent and a
//! [`ContentFactory`] only when the tree is built. [`apply_concerns`] stacks any
//! number of builders around a handler builder.

use std::sync::{Arc, Weak};

use crate::handler::{
    ContentIter, Handler, HandlerBuilder, HandlerFuture, ParentRef, PrepareFuture,
};
use crate::http::{Request, Response};

/// The interception point of a decorator.
///
/// Called with every response that passes through, after the wrapped handler
/// produced it and before it is returned upstream. Never called when the
/// wrapped handler produced no response or failed.
///
/// # Examples
///
/// ```rust
/// use concerns::concern::ResponsePolicy;
/// use concerns::http::{Request, Response};
///
/// struct PoweredBy;
///
/// impl ResponsePolicy for PoweredBy {
///     fn apply(&self, _request: &Request, response: &mut Response) {
///         response.add_header("X-Powered-By", "concerns");
///     }
/// }
/// ```
pub trait ResponsePolicy: Send + Sync + 'static {
    /// Inspects and optionally mutates `response` in place.
    fn apply(&self, request: &Request, response: &mut Response);
}

/// Produces the handler a concern wraps, given the concern as its parent.
pub type ContentFactory<'a> = Box<dyn FnOnce(ParentRef) -> Arc<dyn Handler> + 'a>;

/// Deferred construction of a concern.
///
/// `build` must construct the concern under `parent` and obtain its content by
/// calling `content` exactly once with a reference to the new concern.
pub trait ConcernBuilder: Send + Sync {
    /// Builds the concern under `parent`, wrapping whatever `content` produces.
    fn build(&self, parent: ParentRef, content: ContentFactory<'_>) -> Arc<dyn Handler>;
}

/// A handler decorator applying policy `P` to every response of its content.
pub struct Concern<P> {
    parent: ParentRef,
    content: Arc<dyn Handler>,
    policy: P,
}

impl<P: ResponsePolicy> Concern<P> {
    /// Creates a concern under `parent` and builds its content with `factory`.
    ///
    /// `factory` receives a reference to the new concern, which becomes the
    /// parent of whatever it returns.
    pub fn new<F>(parent: ParentRef, policy: P, factory: F) -> Arc<Self>
    where
        F: FnOnce(ParentRef) -> Arc<dyn Handler>,
    {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let me: Weak<dyn Handler> = me.clone();
            let content = factory(ParentRef::from(me));
            Self {
                parent,
                content,
                policy,
            }
        })
    }

    /// Returns the handler this concern wraps.
    pub fn wrapped(&self) -> &Arc<dyn Handler> {
        &self.content
    }

    /// Returns the policy applied to responses.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns the reference to the parent this concern was built under.
    pub fn parent_ref(&self) -> &ParentRef {
        &self.parent
    }
}

impl<P: ResponsePolicy> Handler for Concern<P> {
    fn parent(&self) -> Option<Arc<dyn Handler>> {
        self.parent.upgrade()
    }

    fn content<'a>(&'a self, request: &'a Request) -> ContentIter<'a> {
        self.content.content(request)
    }

    fn handle<'a>(&'a self, request: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            let mut response = self.content.handle(request).await?;
            if let Some(response) = response.as_mut() {
                self.policy.apply(request, response);
            }
            Ok(response)
        })
    }

    fn prepare(&self) -> PrepareFuture<'_> {
        self.content.prepare()
    }
}

/// Builds `inner` wrapped in `concerns`, the first of which is outermost.
///
/// The outermost concern is built under `parent`; every further layer, and
/// finally `inner`, is built with the concern directly above it as its parent.
/// Without concerns this is just `inner.build(parent)`.
pub fn apply_concerns(
    concerns: &[Box<dyn ConcernBuilder>],
    parent: ParentRef,
    inner: &dyn HandlerBuilder,
) -> Arc<dyn Handler> {
    match concerns.split_first() {
        None => inner.build(parent),
        Some((outer, rest)) => outer.build(
            parent,
            Box::new(move |me| apply_concerns(rest, me, inner)),
        ),
    }
}
