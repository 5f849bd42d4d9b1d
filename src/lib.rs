//! lane_web - a barebones HTTP/1.1 origin server on a pooled-worker core
//!
//! A plaintext origin server with three tightly-coupled pieces at its
//! heart: a per-connection lifecycle state machine, a strict zero-copy
//! request parser, and an immutable route table built from declarative
//! lanes before any I/O begins.
//!
//! # Shape
//!
//! - **Connections** are pooled worker states, each owning one 16 KiB
//!   buffer reused for the request head and the formatted response head.
//!   The lifecycle (read → dispatch → write head → write body → terminate)
//!   is an explicit state enum; every transition awaits one I/O completion.
//! - **The parser** produces a [`Request`] whose fields are slices into the
//!   connection buffer. Bounds are strict and failures map to a bare status
//!   line on the wire.
//! - **Routes** are declared in [`Lane`](router::Lane)s, flattened and
//!   verified once at startup, then looked up by exact URL compare.
//!
//! # Quick Start
//!
//! ```no_run
//! use lane_web::{
//!     config::HttpConfig,
//!     router::{Handler, Lane, LaneKind, RouteTable},
//!     Body, Headers, HandlerError, Listener, Portal, Request, Response, Server, Status,
//! };
//!
//! fn index(_: &Portal, _: &Request<'_>, headers: &mut Headers) -> Result<Response, HandlerError> {
//!     headers.set_static("Content-Type", b"text/html; charset=utf-8");
//!     Ok(Response::new(Status::Ok, Body::Static(b"<h1>hello</h1>")))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let table = RouteTable::build(vec![
//!         Lane::new(LaneKind::WebPage, "/").agent("", Handler::Get(index)),
//!     ])
//!     .expect("route table rejected");
//!
//!     Server::builder()
//!         .listener(Listener::bind(&HttpConfig::default()).expect("bind failed"))
//!         .routes(table)
//!         .build()
//!         .launch()
//!         .await
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod listener;
    pub(crate) mod portal;
    pub(crate) mod server_impl;
}
pub mod config;
pub mod errors;
pub mod limits;
pub mod logging;
pub mod pages;
pub mod router;

pub use crate::{
    errors::{HandlerError, ParseError},
    http::{
        request::{parse, Request},
        response::{Body, HeaderValue, Headers, Response},
        types::{Method, Status},
    },
    server::{
        listener::{Listener, ListenerError},
        portal::Portal,
        server_impl::{Server, ServerBuilder},
    },
};

#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str(value: Option<&[u8]>) -> Option<&str> {
        Some(from_utf8(value?).unwrap())
    }

    #[inline]
    pub(crate) fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub(crate) fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
