//! # concerns
//!
//! Handler trees for an async HTTP/1.1 server, decorated by concerns.
//!
//! A site is a tree of [`Handler`]s. Leaves serve content, a
//! [`Layout`](handler::Layout) routes by path, and a [`Concern`] wraps a
//! subtree to post-process every response it produces. Each node knows its
//! parent, and concerns are built before the content they wrap so the content
//! can name the concern as its parent.
//!
//! [`CachePolicy`] is the stock concern: it stamps an `Expires` header on
//! successful responses that are not HTML pages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use concerns::cache::CacheConcernBuilder;
//! use concerns::handler::{HandlerBuilder, LayoutBuilder, ParentRef, Resource};
//! use concerns::http::ContentType;
//! use concerns::server::{Host, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = LayoutBuilder::new()
//!         .route("/", Resource::bytes("<h1>Hello</h1>", ContentType::TextHtml))
//!         .route("/app.css", Resource::bytes("h1 { color: red }", ContentType::TextCss))
//!         .concern(CacheConcernBuilder::days(7))
//!         .build(ParentRef::root());
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     Host::new(root).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod concern;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConcernBuilder, CacheConfig, CachePolicy};
pub use concern::{Concern, ConcernBuilder, ResponsePolicy};
pub use handler::{Handler, HandlerBuilder, HandlerError, ParentRef};
pub use http::{ContentType, Headers, Method, Request, Response, StatusCode};
pub use server::{Host, Server, ServerError};
