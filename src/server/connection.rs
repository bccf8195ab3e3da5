//! One client connection: read a request, dispatch it, write the response.

use std::io;
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::Host;
use crate::http::request::RequestError;
use crate::{Request, Response, StatusCode};

/// Largest request, head plus body, buffered before answering `413`.
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

// What the next read from the socket produced.
enum Incoming {
    Request(Request),
    // The client closed the connection between requests.
    Closed,
    // Sent as is, then the connection is closed.
    Rejected(Response),
}

pub(crate) struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buf: BytesMut,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buf: BytesMut::with_capacity(INITIAL_BUF_SIZE),
        }
    }

    /// Serves requests until the client closes or asks to close.
    pub(crate) async fn serve(mut self, host: &Host) -> io::Result<()> {
        loop {
            let request = match self.next_request().await? {
                Incoming::Request(request) => request,
                Incoming::Closed => {
                    debug!(peer = %self.peer, "connection closed by peer");
                    return Ok(());
                }
                Incoming::Rejected(response) => {
                    return self.send(response.keep_alive(false)).await;
                }
            };

            let keep_alive = request.is_keep_alive();
            debug!(
                peer = %self.peer,
                method = %request.method(),
                path = %request.path(),
                "dispatching request"
            );

            let response = host.dispatch(request).await;
            self.send(response.keep_alive(keep_alive)).await?;

            if !keep_alive {
                debug!(peer = %self.peer, "closing after response");
                return Ok(());
            }
        }
    }

    // Parses from the buffer first, so pipelined requests are served without
    // another read. The request body is consumed and dropped.
    async fn next_request(&mut self) -> io::Result<Incoming> {
        loop {
            match Request::parse(&self.buf) {
                Ok((request, head_len)) => {
                    let total = head_len + request.content_length().unwrap_or(0);
                    if total > MAX_REQUEST_SIZE {
                        return Ok(Incoming::Rejected(too_large(self.peer)));
                    }
                    if self.buf.len() >= total {
                        self.buf.advance(total);
                        return Ok(Incoming::Request(request));
                    }
                }
                Err(RequestError::Incomplete) if self.buf.len() > MAX_REQUEST_SIZE => {
                    return Ok(Incoming::Rejected(too_large(self.peer)));
                }
                Err(RequestError::Incomplete) => {}
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "malformed request");
                    let response =
                        Response::new(StatusCode::BadRequest).body(format!("Bad Request: {e}"));
                    return Ok(Incoming::Rejected(response));
                }
            }

            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Ok(Incoming::Closed);
            }
        }
    }

    async fn send(&mut self, response: Response) -> io::Result<()> {
        self.stream.write_all(&response.into_bytes()).await?;
        self.stream.flush().await
    }
}

fn too_large(peer: SocketAddr) -> Response {
    warn!(peer = %peer, limit = MAX_REQUEST_SIZE, "request too large");
    Response::new(StatusCode::PayloadTooLarge).body("Request entity too large")
}
