//! Declarative route lanes and the flattened route table.
//!
//! Routes are declared in groups called *lanes*: a lane fixes the kind of
//! its routes, a scope prefix, optional body bounds, and an ordered set of
//! guards. The table is built once before any I/O by flattening every lane's
//! agents into `scope ++ suffix` URLs; any verification failure aborts
//! startup. After construction the table is immutable and safe to share.
//!
//! Lookup is a linear scan comparing exact URL bytes. At the table sizes
//! this server targets a cache-friendly linear compare beats hashing, and it
//! keeps the table trivially buildable at program start.

use crate::{
    errors::HandlerError,
    http::{
        request::Request,
        response::{Headers, Response},
        types::Method,
    },
    server::portal::Portal,
};
use thiserror::Error;

/// What a lane's routes serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneKind {
    /// JSON-ish endpoints; GET and POST agents.
    DataApi,
    /// Rendered pages; GET agents only.
    WebPage,
    /// Upgrade endpoints; TUNNEL agents only. Answered with `503` by this
    /// core.
    WebSocket,
}

/// A route handler body.
pub type PageFn = fn(&Portal, &Request<'_>, &mut Headers) -> Result<Response, HandlerError>;

/// A pre-handler. Returning `Some` short-circuits the route: the returned
/// response is sent and the handler never runs.
pub type GuardFn = fn(&Portal, &Request<'_>, &mut Headers) -> Option<Response>;

/// A handler tagged by its method kind. Dispatch switches on the tag.
#[derive(Debug, Clone, Copy)]
pub enum Handler {
    Get(PageFn),
    /// Reserved: POST routes are registered but answer `503` until body
    /// ingestion lands.
    Post(PageFn),
    /// Reserved: tunnel routes answer `503`.
    Tunnel,
}

impl Handler {
    /// The method this handler serves, derived from the tag so record and
    /// handler cannot disagree.
    #[inline(always)]
    pub const fn method(&self) -> Method {
        match self {
            Handler::Get(_) => Method::Get,
            Handler::Post(_) => Method::Post,
            Handler::Tunnel => Method::Tunnel,
        }
    }
}

/// A method-filtered pre-handler attached to a lane.
#[derive(Debug, Clone, Copy)]
pub struct Guard {
    pub method: Method,
    pub check: GuardFn,
}

/// A handler binding inside a lane: URL suffix plus tagged handler.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    pub suffix: &'static str,
    pub handler: Handler,
}

/// Default body bound for lanes that do not set one, in KiB.
const DEFAULT_BODY_KIB: usize = 16;

/// A declarative grouping of routes sharing a kind, scope prefix, guards
/// and body bounds.
#[derive(Debug, Clone)]
pub struct Lane {
    kind: LaneKind,
    scope: &'static str,
    limit: Option<usize>,
    capacity: Option<usize>,
    guards: Vec<Guard>,
    agents: Vec<Agent>,
}

impl Lane {
    pub fn new(kind: LaneKind, scope: &'static str) -> Self {
        Self {
            kind,
            scope,
            limit: None,
            capacity: None,
            guards: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Attaches a guard. Guards keep their declaration order and are
    /// filtered per agent by method at build time.
    pub fn guard(mut self, method: Method, check: GuardFn) -> Self {
        self.guards.push(Guard { method, check });
        self
    }

    /// Binds a handler at `scope ++ suffix`.
    pub fn agent(mut self, suffix: &'static str, handler: Handler) -> Self {
        self.agents.push(Agent { suffix, handler });
        self
    }

    /// Request-body size bound in KiB for this lane's routes.
    pub fn body_limit(mut self, kib: usize) -> Self {
        self.limit = Some(kib);
        self
    }

    /// Request-body buffer capacity in KiB for this lane's routes.
    pub fn body_capacity(mut self, kib: usize) -> Self {
        self.capacity = Some(kib);
        self
    }
}

/// One flattened URL-to-handler binding.
#[derive(Debug, Clone)]
pub struct Route {
    pub kind: LaneKind,
    pub method: Method,
    pub url: String,
    pub handler: Handler,
    /// Lane guards whose method matches this route, declaration order kept.
    pub guards: Vec<GuardFn>,
    /// Body bound in bytes. Carried for the future ingestion path.
    pub body_limit: usize,
    /// Body buffer capacity in bytes. Carried for the future ingestion path.
    pub body_capacity: usize,
}

/// Fatal route-table construction failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("duplicate route url `{0}`")]
    DuplicateUrl(String),

    #[error("tunnel agent `{0}` not allowed in a data lane")]
    TunnelInDataLane(String),

    #[error("non-GET agent `{0}` not allowed in a page lane")]
    NonGetInPageLane(String),

    #[error("non-tunnel agent `{0}` not allowed in a socket lane")]
    NonTunnelInSocketLane(String),
}

/// The immutable, ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Flattens and verifies a lane set. Every failure here is fatal: the
    /// caller must not open the listening socket with a rejected table.
    pub fn build(lanes: Vec<Lane>) -> Result<Self, RouteError> {
        let mut routes: Vec<Route> = Vec::new();

        for lane in &lanes {
            for agent in &lane.agents {
                let url = format!("{}{}", lane.scope, agent.suffix);
                let method = agent.handler.method();

                match (lane.kind, method) {
                    (LaneKind::DataApi, Method::Tunnel) => {
                        return Err(RouteError::TunnelInDataLane(url));
                    }
                    (LaneKind::WebPage, m) if m != Method::Get => {
                        return Err(RouteError::NonGetInPageLane(url));
                    }
                    (LaneKind::WebSocket, m) if m != Method::Tunnel => {
                        return Err(RouteError::NonTunnelInSocketLane(url));
                    }
                    _ => {}
                }

                if routes.iter().any(|route| route.url == url) {
                    return Err(RouteError::DuplicateUrl(url));
                }

                let guards = lane
                    .guards
                    .iter()
                    .filter(|guard| guard.method == method)
                    .map(|guard| guard.check)
                    .collect();

                routes.push(Route {
                    kind: lane.kind,
                    method,
                    url,
                    handler: agent.handler,
                    guards,
                    body_limit: lane.limit.unwrap_or(DEFAULT_BODY_KIB) * 1024,
                    body_capacity: lane.capacity.unwrap_or(DEFAULT_BODY_KIB) * 1024,
                });
            }
        }

        Ok(Self { routes })
    }

    /// Exact-match lookup.
    #[inline]
    pub fn find(&self, url: &[u8]) -> Option<&Route> {
        self.routes.iter().find(|route| route.url.as_bytes() == url)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
