//! Binds a handler tree and the server-wide middleware stack to a [`Server`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::{Server, ServerError};
use crate::handler::{Handler, HandlerError};
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Request, Response};

/// A runnable site: the root of a handler tree plus the middleware that sees
/// every request before the tree does.
///
/// # Examples
///
/// ```rust,no_run
/// use concerns::cache::CacheConcernBuilder;
/// use concerns::handler::{HandlerBuilder, LayoutBuilder, ParentRef, Resource};
/// use concerns::http::ContentType;
/// use concerns::middleware::LoggerMiddleware;
/// use concerns::server::{Host, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let root = LayoutBuilder::new()
///         .route("/logo.svg", Resource::bytes("<svg/>", ContentType::ImageSvg))
///         .concern(CacheConcernBuilder::days(30))
///         .build(ParentRef::root());
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     Host::new(root).middleware(LoggerMiddleware).run(server).await?;
///     Ok(())
/// }
/// ```
pub struct Host {
    root: Arc<dyn Handler>,
    middlewares: Arc<[MiddlewareHandler]>,
}

impl Host {
    /// Creates a host serving `root` with an empty middleware stack.
    pub fn new(root: Arc<dyn Handler>) -> Self {
        Self {
            root,
            middlewares: Arc::from([]),
        }
    }

    /// Appends a middleware. The first one added is the outermost.
    #[must_use]
    pub fn middleware<M>(self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middleware_fn(from_middleware(Arc::new(middleware)))
    }

    /// Appends an already type-erased middleware function.
    #[must_use]
    pub fn middleware_fn(mut self, handler: MiddlewareHandler) -> Self {
        let mut stack = self.middlewares.to_vec();
        stack.push(handler);
        self.middlewares = stack.into();
        self
    }

    /// Returns the root of the handler tree.
    pub fn root(&self) -> &Arc<dyn Handler> {
        &self.root
    }

    /// Prepares the whole tree once, before any request is served.
    pub async fn prepare(&self) -> Result<(), HandlerError> {
        self.root.prepare().await?;
        info!(middlewares = self.middlewares.len(), "handler tree prepared");
        Ok(())
    }

    /// Runs one request through the middleware stack and the tree.
    pub async fn dispatch(&self, request: Request) -> Response {
        Next::new(Arc::clone(&self.middlewares), Arc::clone(&self.root))
            .run(request)
            .await
    }

    /// Prepares the tree, then accepts connections on `server` indefinitely.
    ///
    /// Each connection is served on its own task. Failures on a single
    /// connection, or in accepting one, are logged and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Prepare`] if the tree cannot be prepared.
    pub async fn run(self, server: Server) -> Result<(), ServerError> {
        if let Err(e) = self.prepare().await {
            error!(error = %e, "failed to prepare handler tree");
            return Err(e.into());
        }

        let host = Arc::new(self);
        info!(address = %server.local_addr, "listening");

        loop {
            let (stream, peer) = match server.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer, "connection accepted");
            let host = Arc::clone(&host);
            tokio::spawn(async move {
                if let Err(e) = Connection::new(stream, peer).serve(&host).await {
                    warn!(peer = %peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::cache::{CacheConcernBuilder, CachePolicy};
    use crate::handler::{HandlerBuilder, LayoutBuilder, ParentRef, Resource};
    use crate::http::ContentType;
    use crate::middleware::PolicyMiddleware;
    use crate::{Method, StatusCode};

    fn site() -> Arc<dyn Handler> {
        LayoutBuilder::new()
            .route("/", Resource::bytes("<h1>home</h1>", ContentType::TextHtml))
            .route("/logo.png", Resource::bytes(vec![0x89, b'P', b'N', b'G'], ContentType::ImagePng))
            .concern(CacheConcernBuilder::days(30))
            .build(ParentRef::root())
    }

    #[tokio::test]
    async fn dispatch_serves_the_decorated_tree() {
        let host = Host::new(site());
        host.prepare().await.unwrap();

        let image = host.dispatch(Request::get("/logo.png")).await;
        assert_eq!(image.status(), StatusCode::Ok);
        assert!(image.get_expires().is_some());

        let page = host.dispatch(Request::get("/")).await;
        assert_eq!(page.status(), StatusCode::Ok);
        assert_eq!(page.get_expires(), None);

        let missing = host.dispatch(Request::new(Method::Get, "/nope?x=1")).await;
        assert_eq!(missing.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn middleware_wraps_the_tree() {
        let host = Host::new(site()).middleware(PolicyMiddleware::new(
            CachePolicy::days(1).predicate(|_, response| response.get_content_type() == Some(ContentType::TextHtml)),
        ));

        let page = host.dispatch(Request::get("/")).await;
        assert!(page.get_expires().is_some());
    }

    #[tokio::test]
    async fn prepare_failure_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = LayoutBuilder::new()
            .route("/gone.css", Resource::file(dir.path().join("gone.css")))
            .build(ParentRef::root());
        let server = Server::bind("127.0.0.1:0").await.unwrap();

        let err = Host::new(root).run(server).await.unwrap_err();
        assert!(matches!(err, ServerError::Prepare(HandlerError::Io(_))));
    }

    async fn serve_site() -> (SocketAddr, JoinHandle<Result<(), ServerError>>) {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        (addr, tokio::spawn(Host::new(site()).run(server)))
    }

    // Writes `raw` on a fresh connection and reads until the server closes it.
    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        String::from_utf8_lossy(&received).into_owned()
    }

    async fn fetch(addr: SocketAddr, path: &str) -> String {
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        exchange(addr, request.as_bytes()).await
    }

    #[tokio::test]
    async fn expires_header_reaches_the_wire() {
        let (addr, task) = serve_site().await;

        let image = fetch(addr, "/logo.png").await;
        assert!(image.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(image.contains("Content-Type: image/png\r\n"));
        assert!(image.contains("Expires: "));
        assert!(image.contains(" GMT\r\n"));

        let page = fetch(addr, "/").await;
        assert!(page.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!page.contains("Expires: "));
        assert!(page.contains("Connection: close\r\n"));

        task.abort();
    }

    #[tokio::test]
    async fn keep_alive_serves_pipelined_requests() {
        let (addr, task) = serve_site().await;

        let raw = exchange(
            addr,
            b"GET /logo.png HTTP/1.1\r\nHost: a\r\n\r\n\
              POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 3\r\n\r\nabc\
              GET / HTTP/1.1\r\nHost: a\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert_eq!(raw.matches("HTTP/1.1 200 OK\r\n").count(), 3);
        assert_eq!(raw.matches("Connection: keep-alive\r\n").count(), 2);
        assert!(raw.contains("Connection: close\r\n"));
        assert_eq!(raw.matches("Expires: ").count(), 1);

        task.abort();
    }

    #[tokio::test]
    async fn malformed_request_is_rejected_and_closed() {
        let (addr, task) = serve_site().await;

        let raw = exchange(addr, b"GET / HTTX/1.1\r\n\r\n").await;
        assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(raw.contains("Connection: close\r\n"));

        task.abort();
    }
}
