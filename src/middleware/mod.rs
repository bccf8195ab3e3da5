//! Middleware pipeline: server-wide before/after logic around the handler tree.
//!
//! Concerns decorate one subtree; middleware sees every request the server
//! accepts, including those the tree does not serve. Each middleware wraps the
//! next layer, and the last layer is the root [`Handler`] of the tree.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`]: converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`LoggerMiddleware`]: built-in request/response logger.
//! - [`PolicyMiddleware`]: applies a [`ResponsePolicy`] to every response.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;
use tracing::{error, info};

use crate::concern::ResponsePolicy;
use crate::handler::Handler;
use crate::{Request, Response, StatusCode};

/// Boxed future returned by [`Middleware::handle`].
pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
///
/// Construct one with [`from_middleware`] or by wrapping a closure directly:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use concerns::{Request, middleware::{MiddlewareFuture, MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler = Arc::new(|request: Request, next: Next| {
///     Box::pin(async move { next.run(request).await }) as MiddlewareFuture
/// });
/// ```
pub type MiddlewareHandler = Arc<dyn Fn(Request, Next) -> MiddlewareFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use concerns::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |request: Request, next: Next| middleware.handle(request, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the
/// next middleware, or dispatches to the handler tree once the chain is
/// exhausted.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
    endpoint: Arc<dyn Handler>,
}

impl Next {
    /// Creates a new `Next` positioned at the start of `middlewares`, ending at
    /// `endpoint`.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>, endpoint: Arc<dyn Handler>) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Once every middleware has run, the request goes to the handler tree:
    ///
    /// - a response is returned as is,
    /// - "not found here" becomes `404 Not Found`,
    /// - a handler error is logged and becomes `500 Internal Server Error`.
    pub async fn run(mut self, request: Request) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            return handler(request, self).await;
        }

        match self.endpoint.handle(&request).await {
            Ok(Some(response)) => response,
            Ok(None) => Response::new(StatusCode::NotFound).body("Not Found"),
            Err(e) => {
                error!(
                    method = %request.method(),
                    path = %request.path(),
                    error = %e,
                    "handler failed"
                );
                Response::new(StatusCode::InternalServerError).body("Internal Server Error")
            }
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive the [`Request`] and a [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(request).await` without modification.
/// - **Short-circuit**: return a [`Response`] directly without calling `next`.
/// - **Decorate**: call `next.run(request).await`, inspect the response, and
///   return a modified copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited across
///   `.await` points in multi-threaded runtimes.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, request: Request, next: Next) -> MiddlewareFuture;
}

/// Built-in middleware that logs one `info!` event per request, once the
/// response is ready, with `method`, `path`, `status` and `elapsed` fields.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, request: Request, next: Next) -> MiddlewareFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().clone();
            let path = request.path().to_owned();

            let response = next.run(request).await;

            info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request served"
            );
            response
        })
    }
}

/// Applies a [`ResponsePolicy`] to every response leaving the server.
///
/// The server-wide counterpart of a [`Concern`](crate::concern::Concern): the
/// policy sees responses from the whole tree, as well as the `404` and `500`
/// responses produced when the tree serves nothing or fails.
///
/// # Examples
///
/// ```rust
/// use concerns::cache::CachePolicy;
/// use concerns::middleware::PolicyMiddleware;
///
/// let client_cache = PolicyMiddleware::new(CachePolicy::days(7));
/// ```
pub struct PolicyMiddleware<P> {
    policy: Arc<P>,
}

impl<P: ResponsePolicy> PolicyMiddleware<P> {
    /// Wraps `policy` for use in the middleware stack.
    pub fn new(policy: P) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// Returns the wrapped policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<P: ResponsePolicy> Middleware for PolicyMiddleware<P> {
    fn handle(&self, request: Request, next: Next) -> MiddlewareFuture {
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            // `next` consumes the request.
            let seen = request.clone();
            let mut response = next.run(request).await;
            policy.apply(&seen, &mut response);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::CachePolicy;
    use crate::handler::testing::Recorder;
    use crate::handler::{HandlerError, ParentRef};
    use crate::http::ContentType;

    fn tree() -> Arc<dyn Handler> {
        Arc::new(Recorder::new(ParentRef::root(), |request| match request.path() {
            "/logo.png" => Ok(Some(
                Response::new(StatusCode::Ok).content_type(ContentType::ImagePng),
            )),
            "/" => Ok(Some(
                Response::new(StatusCode::Ok).content_type(ContentType::TextHtml),
            )),
            "/boom" => Err(HandlerError::Message("boom".into())),
            _ => Ok(None),
        }))
    }

    fn chain(middlewares: Vec<MiddlewareHandler>) -> impl Fn() -> Next {
        let middlewares: Arc<[MiddlewareHandler]> = middlewares.into();
        let endpoint = tree();
        move || Next::new(Arc::clone(&middlewares), Arc::clone(&endpoint))
    }

    #[tokio::test]
    async fn exhausted_chain_dispatches_to_tree() {
        let next = chain(vec![]);
        let request = Request::get("/logo.png");
        let response = next().run(request).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.get_content_type(), Some(ContentType::ImagePng));
    }

    #[tokio::test]
    async fn not_found_and_failure_are_mapped() {
        let next = chain(vec![]);

        let missing = Request::get("/missing");
        let response = next().run(missing).await;
        assert_eq!(response.status(), StatusCode::NotFound);

        let boom = Request::get("/boom");
        let response = next().run(boom).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn middlewares_run_in_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let stamp = |name: &'static str, order: Arc<AtomicUsize>| -> MiddlewareHandler {
            Arc::new(move |request: Request, next: Next| {
                let order = Arc::clone(&order);
                Box::pin(async move {
                    let position = order.fetch_add(1, Ordering::SeqCst);
                    let mut response = next.run(request).await;
                    response.add_header("X-Layer", format!("{name}:{position}"));
                    response
                }) as MiddlewareFuture
            })
        };

        let next = chain(vec![
            stamp("outer", Arc::clone(&order)),
            stamp("inner", Arc::clone(&order)),
        ]);
        let request = Request::get("/");
        let response = next().run(request).await;
        let layers: Vec<_> = response.headers().get_all("x-layer").collect();
        assert_eq!(layers, vec!["inner:1", "outer:0"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_tree() {
        let deny: MiddlewareHandler = Arc::new(|_request: Request, _next: Next| {
            Box::pin(async { Response::new(StatusCode::Forbidden) }) as MiddlewareFuture
        });
        let next = chain(vec![deny]);
        let request = Request::get("/boom");
        let response = next().run(request).await;
        assert_eq!(response.status(), StatusCode::Forbidden);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let next = chain(vec![from_middleware(Arc::new(LoggerMiddleware))]);
        let request = Request::get("/logo.png");
        let response = next().run(request).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.get_expires(), None);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn logger_records_structured_fields() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let next = chain(vec![from_middleware(Arc::new(LoggerMiddleware))]);
        next().run(Request::get("/logo.png")).await;

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("request served"))
            .unwrap();
        assert!(line.contains("method=GET"));
        assert!(line.contains("path=/logo.png"));
        assert!(line.contains("status=200"));
        assert!(line.contains("elapsed="));
    }

    #[tokio::test]
    async fn policy_middleware_applies_to_every_response() {
        let cache = PolicyMiddleware::new(CachePolicy::days(30));
        assert_eq!(cache.policy().duration(), chrono::TimeDelta::days(30));
        let next = chain(vec![from_middleware(Arc::new(cache))]);

        let image = Request::get("/logo.png");
        let response = next().run(image).await;
        assert!(response.get_expires().is_some());

        let page = Request::get("/");
        let response = next().run(page).await;
        assert_eq!(response.get_expires(), None);

        // Fallback responses are not 200 OK and stay uncached.
        let missing = Request::get("/missing.png");
        let response = next().run(missing).await;
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.get_expires(), None);
    }

    #[tokio::test]
    async fn policy_sees_request_path() {
        let policy = CachePolicy::days(1).predicate(|request, _| request.path() == "/");
        let next = chain(vec![from_middleware(Arc::new(PolicyMiddleware::new(policy)))]);

        let page = Request::get("/");
        assert!(next().run(page).await.get_expires().is_some());
        let image = Request::get("/logo.png");
        assert!(next().run(image).await.get_expires().is_none());
    }
}
