//! Serving handler trees over TCP.
//!
//! [`Server`] owns the bound listener. [`Host`] owns the handler tree and the
//! middleware stack, and runs the accept loop on a server it is given. Each
//! accepted socket is served on its own Tokio task, one request at a time,
//! for as long as the client keeps the connection alive.

mod connection;
pub mod host;

pub use host::Host;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::handler::HandlerError;

/// Errors that stop a server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare handler tree: {0}")]
    Prepare(#[from] HandlerError),
}

/// A bound TCP listener waiting for a [`Host`] to serve on it.
///
/// Binding is separate from serving so callers can learn the actual address
/// (e.g. after binding port `0`) before the accept loop starts.
///
/// ```rust,no_run
/// use concerns::server::Server;
///
/// # async fn bind() -> Result<(), concerns::server::ServerError> {
/// let server = Server::bind("127.0.0.1:0").await?;
/// println!("bound to {}", server.local_addr());
/// # Ok(())
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds a listener to `addr`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_reports_the_assigned_port() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        assert!(server.local_addr().ip().is_loopback());
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn bind_failure_names_the_address() {
        let err = Server::bind("not an address").await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().starts_with("failed to bind to not an address"));
    }
}
