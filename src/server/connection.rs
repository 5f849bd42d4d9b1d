//! Per-connection lifecycle state machine.
//!
//! One `Connection` is a pooled worker state: a 16 KiB buffer shared between
//! the received request head and the formatted response head, plus the
//! bookkeeping the exchange needs. The lifecycle is an explicit state enum
//! driven by a `match` loop; every transition sits behind an `.await`, so
//! the machine is quiescent between I/O completions and no thread ever
//! blocks on a specific connection.
//!
//! | State       | Waits on          | Then                                       |
//! |-------------|-------------------|--------------------------------------------|
//! | Reading     | receive + timer   | Dispatching; EOF/expiry mark stale         |
//! | Dispatching | nothing (CPU)     | WritingHead                                |
//! | WritingHead | send of the head  | WritingBody                                |
//! | WritingBody | sends of ≤16 KiB  | Terminating, or Reading when reuse is on   |
//! | Terminating | shutdown + EOF    | Closing                                    |
//! | Closing     | nothing           | worker returns to the pool                 |
//!
//! The idle timer is armed around every receive; its first firing (or a peer
//! half-close) marks the connection stale and shuts it down, a second one
//! forces the close.

use crate::{
    http::{
        request::{parse, Request},
        response::{format_head, Headers, Response},
        types::Status,
    },
    limits::{ConnLimits, CONN_BUFFER_SIZE},
    router::{Handler, RouteTable},
    server::portal::Portal,
};
use std::{io, net::SocketAddr};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Reading,
    Dispatching,
    WritingHead,
    WritingBody,
    Terminating,
    Closing,
}

/// What dispatch decided to answer.
enum Outcome {
    /// Error path: a bare status line, no headers, no body.
    Status(Status),
    /// A guard or handler produced a full response.
    Success { headers: Headers, response: Response },
}

/// Pooled per-connection state.
pub(crate) struct Connection {
    buffer: Box<[u8]>,
    read_len: usize,
    head_len: usize,
    stale: bool,
    exchange_ok: bool,
    response: Option<Response>,
    limits: ConnLimits,
}

impl Connection {
    pub(crate) fn new(limits: ConnLimits) -> Self {
        Self {
            buffer: vec![0; CONN_BUFFER_SIZE].into_boxed_slice(),
            read_len: 0,
            head_len: 0,
            stale: false,
            exchange_ok: false,
            response: None,
            limits,
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.read_len = 0;
        self.head_len = 0;
        self.stale = false;
        self.exchange_ok = false;
        self.response = None;
    }

    /// Clears per-request fields when a reused connection loops back to
    /// Reading. The stale flag survives: it belongs to the connection.
    #[inline]
    fn reset_exchange(&mut self) {
        self.read_len = 0;
        self.head_len = 0;
        self.exchange_ok = false;
        self.response = None;
    }

    /// Drives one accepted socket from first receive to close.
    pub(crate) async fn run(
        &mut self,
        stream: &mut TcpStream,
        peer: SocketAddr,
        table: &RouteTable,
        portal: &Portal,
    ) -> io::Result<()> {
        self.reset();
        let mut state = ConnState::Reading;

        loop {
            state = match state {
                ConnState::Reading => {
                    match timeout(self.limits.keepalive, stream.read(&mut self.buffer[..])).await {
                        // idle timer fired
                        Err(_) => {
                            if self.stale {
                                ConnState::Closing
                            } else {
                                debug!(%peer, "idle connection expired");
                                self.stale = true;
                                ConnState::Terminating
                            }
                        }
                        // peer half-closed without sending a request
                        Ok(Ok(0)) => {
                            self.stale = true;
                            ConnState::Closing
                        }
                        Ok(Ok(n)) => {
                            self.read_len = n;
                            ConnState::Dispatching
                        }
                        Ok(Err(err)) => {
                            error!(%peer, %err, "receive failed");
                            return Err(err);
                        }
                    }
                }
                ConnState::Dispatching => {
                    self.dispatch(table, portal);
                    ConnState::WritingHead
                }
                ConnState::WritingHead => {
                    match stream.write_all(&self.buffer[..self.head_len]).await {
                        Ok(()) => ConnState::WritingBody,
                        Err(err) => {
                            error!(%peer, %err, "head send failed");
                            return Err(err);
                        }
                    }
                }
                ConnState::WritingBody => {
                    let sent = Self::send_body(stream, self.response.as_mut()).await;
                    // Dynamic bodies are released here, sent or not
                    self.response = None;
                    match sent {
                        Ok(()) => {
                            if self.limits.reuse_connections && self.exchange_ok && !self.stale {
                                self.reset_exchange();
                                ConnState::Reading
                            } else {
                                ConnState::Terminating
                            }
                        }
                        Err(err) => {
                            error!(%peer, %err, "body send failed");
                            return Err(err);
                        }
                    }
                }
                ConnState::Terminating => {
                    let _ = stream.shutdown().await;
                    self.drain(stream).await;
                    ConnState::Closing
                }
                ConnState::Closing => {
                    debug!(%peer, "connection closed");
                    return Ok(());
                }
            };
        }
    }

    /// Waits for the peer to finish after our shutdown. Silence, EOF and
    /// errors all end the wait.
    async fn drain(&mut self, stream: &mut TcpStream) {
        loop {
            match timeout(self.limits.keepalive, stream.read(&mut self.buffer[..])).await {
                Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return,
                Ok(Ok(_)) => continue,
            }
        }
    }

    /// Streams the response body in bounded chunks, straight from its
    /// source slice.
    async fn send_body(stream: &mut TcpStream, response: Option<&mut Response>) -> io::Result<()> {
        let Some(response) = response else {
            return Ok(());
        };

        while let Some((start, end)) = response.next_chunk_range() {
            stream.write_all(&response.body_bytes()[start..end]).await?;
            response.advance(end - start);
        }
        Ok(())
    }

    /// Parses the buffered head, resolves the route, runs guards and the
    /// handler, then formats the response head back into the same buffer.
    fn dispatch(&mut self, table: &RouteTable, portal: &Portal) {
        self.exchange_ok = false;

        let outcome = {
            let head = &self.buffer[..self.read_len];
            match parse(head) {
                Err(err) => {
                    warn!(%err, "request rejected");
                    Outcome::Status(err.status())
                }
                Ok(request) => Self::route(table, portal, &request),
            }
        };

        let formatted = match &outcome {
            Outcome::Status(status) => format_head(&mut self.buffer, *status, None),
            Outcome::Success { headers, response } => format_head(
                &mut self.buffer,
                response.status(),
                Some((headers, response.body_len())),
            ),
        };
        self.head_len = match formatted {
            Ok(len) => len,
            Err(err) => {
                // the buffer bounds every head this server may emit
                error!(%err, "response head overflow");
                panic!("response head does not fit the connection buffer");
            }
        };

        if let Outcome::Success { response, .. } = outcome {
            self.exchange_ok = true;
            self.response = Some(response);
        }
    }

    fn route(table: &RouteTable, portal: &Portal, request: &Request<'_>) -> Outcome {
        let Some(route) = table.find(request.url()) else {
            return Outcome::Status(Status::NotFound);
        };
        if route.method != request.method() {
            return Outcome::Status(Status::MethodNotAllowed);
        }

        match route.handler {
            // upgrades are not served by this core
            Handler::Tunnel => Outcome::Status(Status::ServiceUnavailable),
            // body ingestion beyond the request head is not wired up yet
            Handler::Post(_) => Outcome::Status(Status::ServiceUnavailable),
            Handler::Get(handler) => {
                let mut headers = Headers::new();

                for guard in &route.guards {
                    if let Some(response) = guard(portal, request, &mut headers) {
                        return Outcome::Success { headers, response };
                    }
                }

                match handler(portal, request, &mut headers) {
                    Ok(response) => Outcome::Success { headers, response },
                    Err(err) => {
                        error!(%err, url = %String::from_utf8_lossy(request.url()), "handler failed");
                        Outcome::Status(Status::InternalServerError)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::HandlerError,
        http::response::Body,
        limits::MAX_HEADERS,
        router::{Lane, LaneKind},
        tools::*,
    };
    use crate::http::types::Method;

    fn hi_page(_: &Portal, _: &Request<'_>, headers: &mut Headers) -> Result<Response, HandlerError> {
        headers.set_static("Content-Type", b"text/html; charset=utf-8");
        Ok(Response::new(Status::Ok, Body::Static(b"hi")))
    }

    fn failing(_: &Portal, _: &Request<'_>, _: &mut Headers) -> Result<Response, HandlerError> {
        Err(HandlerError::Other("boom".into()))
    }

    fn post_stub(_: &Portal, _: &Request<'_>, _: &mut Headers) -> Result<Response, HandlerError> {
        Err(HandlerError::Other("not wired up".into()))
    }

    fn key_guard(_: &Portal, request: &Request<'_>, _: &mut Headers) -> Option<Response> {
        match request.header(b"x-api-key") {
            Some(_) => None,
            None => Some(Response::new(Status::BadRequest, Body::Static(b"key required"))),
        }
    }

    fn guarded(_: &Portal, _: &Request<'_>, _: &mut Headers) -> Result<Response, HandlerError> {
        Ok(Response::new(Status::Ok, Body::Static(b"secret")))
    }

    fn test_table() -> RouteTable {
        RouteTable::build(vec![
            Lane::new(LaneKind::WebPage, "/").agent("", Handler::Get(hi_page)),
            Lane::new(LaneKind::WebPage, "/broken").agent("", Handler::Get(failing)),
            Lane::new(LaneKind::DataApi, "/api/user")
                .guard(Method::Get, key_guard)
                .agent("/add", Handler::Post(post_stub))
                .agent("/profile", Handler::Get(guarded)),
            Lane::new(LaneKind::WebSocket, "/ws").agent("", Handler::Tunnel),
        ])
        .unwrap()
    }

    impl Connection {
        fn from_req<V: AsRef<[u8]>>(value: V) -> Self {
            let mut conn = Connection::new(ConnLimits::default());
            let bytes = value.as_ref();
            conn.buffer[..bytes.len()].copy_from_slice(bytes);
            conn.read_len = bytes.len();
            conn
        }

        fn head(&self) -> &[u8] {
            &self.buffer[..self.head_len]
        }
    }

    fn dispatched<V: AsRef<[u8]>>(raw: V) -> Connection {
        let mut conn = Connection::from_req(raw);
        conn.dispatch(&test_table(), &Portal::default());
        conn
    }

    #[test]
    fn registered_get() {
        let conn = dispatched("GET / HTTP/1.1\r\nHost: x\r\n\r\n");

        assert_eq!(
            str_op(conn.head()),
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 2\r\n\r\n"
        );
        assert!(conn.exchange_ok);
        let response = conn.response.unwrap();
        assert_eq!(str_op(response.body_bytes()), "hi");
    }

    #[test]
    fn no_match_is_404() {
        let conn = dispatched("GET /missing HTTP/1.1\r\nHost: x\r\n\r\n");

        assert_eq!(str_op(conn.head()), "HTTP/1.1 404 Not Found\r\n");
        assert!(!conn.exchange_ok);
        assert!(conn.response.is_none());
    }

    #[test]
    fn method_mismatch_is_405() {
        let conn = dispatched("POST / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(str_op(conn.head()), "HTTP/1.1 405 Method Not Allowed\r\n");
    }

    #[test]
    fn post_route_is_503() {
        let conn = dispatched("POST /api/user/add HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(str_op(conn.head()), "HTTP/1.1 503 Service Unavailable\r\n");
    }

    #[test]
    fn tunnel_route_is_503() {
        let conn = dispatched("GET /ws HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(str_op(conn.head()), "HTTP/1.1 503 Service Unavailable\r\n");
    }

    #[test]
    fn unsupported_method_is_500() {
        let conn = dispatched("PUT / HTTP/1.1\r\n\r\n");
        assert_eq!(str_op(conn.head()), "HTTP/1.1 500 Internal Server Error\r\n");
    }

    #[test]
    fn header_flood_is_413() {
        let raw = format!(
            "GET / HTTP/1.1\r\n{}\r\n",
            "Name: value\r\n".repeat(MAX_HEADERS + 1)
        );
        let conn = dispatched(raw);
        assert_eq!(str_op(conn.head()), "HTTP/1.1 413 Payload Too Large\r\n");
    }

    #[test]
    fn handler_failure_is_500() {
        let conn = dispatched("GET /broken HTTP/1.1\r\nHost: x\r\n\r\n");

        assert_eq!(str_op(conn.head()), "HTTP/1.1 500 Internal Server Error\r\n");
        assert!(conn.response.is_none());
    }

    #[test]
    fn guard_short_circuits() {
        let refused = dispatched("GET /api/user/profile HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(
            str_op(refused.head()),
            "HTTP/1.1 400 Bad Request\r\nContent-Length: 12\r\n\r\n"
        );
        assert_eq!(str_op(refused.response.unwrap().body_bytes()), "key required");

        let passed = dispatched("GET /api/user/profile HTTP/1.1\r\nX-Api-Key: k\r\n\r\n");
        assert_eq!(
            str_op(passed.head()),
            "HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\n"
        );
        assert_eq!(str_op(passed.response.unwrap().body_bytes()), "secret");
    }

    #[test]
    fn malformed_head_is_500() {
        let conn = dispatched("GARBAGE\r\n\r\n");
        assert_eq!(str_op(conn.head()), "HTTP/1.1 500 Internal Server Error\r\n");
    }

    #[test]
    fn reset_clears_exchange_state() {
        let mut conn = dispatched("GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(conn.exchange_ok);

        conn.reset();
        assert_eq!(conn.read_len, 0);
        assert_eq!(conn.head_len, 0);
        assert!(!conn.stale);
        assert!(!conn.exchange_ok);
        assert!(conn.response.is_none());
    }
}
