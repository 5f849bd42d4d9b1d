//! The lane_web daemon.
//!
//! Loads a TOML configuration (first argument, `config.toml` by default),
//! initializes logging, registers the lane set, binds the listener and
//! serves until SIGINT or SIGTERM. Exits 0 on a clean shutdown and 1 on any
//! startup failure.

use lane_web::{
    config::Config,
    limits::ConnLimits,
    logging,
    pages::PageStore,
    router::{Handler, Lane, LaneKind, RouteTable},
    Body, HandlerError, Headers, Listener, Method, Portal, Request, Response, Server, Status,
};
use std::{path::Path, process::ExitCode, sync::Arc};
use tracing::{error, info};

fn lanes() -> Vec<Lane> {
    vec![
        Lane::new(LaneKind::WebPage, "/")
            .agent("", Handler::Get(index))
            .agent("home", Handler::Get(home)),
        Lane::new(LaneKind::DataApi, "/api/user")
            .body_limit(4)
            .guard(Method::Get, require_api_key)
            .agent("/profile", Handler::Get(profile))
            .agent("/add", Handler::Post(add_user)),
        Lane::new(LaneKind::WebSocket, "/ws").agent("", Handler::Tunnel),
    ]
}

fn index(portal: &Portal, _: &Request<'_>, headers: &mut Headers) -> Result<Response, HandlerError> {
    headers.set_static("Content-Type", b"text/html; charset=utf-8");

    match portal.pages().render("index", &[("title", "lane_web")]) {
        Some(body) => Ok(Response::new(Status::Ok, Body::Dynamic(body.into_bytes()))),
        None => Ok(Response::new(
            Status::Ok,
            Body::Static(b"<h1>lane_web</h1>"),
        )),
    }
}

fn home(portal: &Portal, request: &Request<'_>, headers: &mut Headers) -> Result<Response, HandlerError> {
    headers.set_static("Content-Type", b"text/html; charset=utf-8");

    let name = request
        .query(b"name")
        .map(|value| String::from_utf8_lossy(value).into_owned())
        .unwrap_or_else(|| "visitor".to_string());

    let body = portal
        .pages()
        .render("home", &[("name", &name)])
        .unwrap_or_else(|| format!("<h1>Home</h1><p>Hello, {name}!</p>"));
    Ok(Response::new(Status::Ok, Body::Dynamic(body.into_bytes())))
}

fn require_api_key(_: &Portal, request: &Request<'_>, _: &mut Headers) -> Option<Response> {
    match request.header(b"x-api-key") {
        Some(_) => None,
        None => Some(Response::new(
            Status::BadRequest,
            Body::Static(b"x-api-key header required"),
        )),
    }
}

fn profile(_: &Portal, request: &Request<'_>, headers: &mut Headers) -> Result<Response, HandlerError> {
    headers.set_static("Content-Type", b"application/json");

    let id = request.query(b"id").unwrap_or(b"0");
    let mut body = Vec::with_capacity(64);
    body.extend_from_slice(b"{\"id\":\"");
    body.extend_from_slice(id);
    body.extend_from_slice(b"\",\"name\":\"unknown\"}");
    Ok(Response::new(Status::Ok, Body::Dynamic(body)))
}

// Registered so the route exists; POST dispatch answers 503 until body
// ingestion lands, so this never runs.
fn add_user(_: &Portal, _: &Request<'_>, _: &mut Headers) -> Result<Response, HandlerError> {
    Err(HandlerError::Other("user ingestion is not wired up".into()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(&config.preset) {
        eprintln!("logging error: {err}");
        return ExitCode::FAILURE;
    }
    info!(config = %config_path, "lane_web starting");

    let table = match RouteTable::build(lanes()) {
        Ok(table) => table,
        Err(err) => {
            error!(%err, "route table rejected");
            return ExitCode::FAILURE;
        }
    };
    let pages = match PageStore::load(&config.preset.page_dir, config.preset.page_limit) {
        Ok(pages) => pages,
        Err(err) => {
            error!(%err, "page store failed");
            return ExitCode::FAILURE;
        }
    };
    let listener = match Listener::bind(&config.server.http) {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, "listener failed");
            return ExitCode::FAILURE;
        }
    };
    info!(routes = table.len(), pages = pages.len(), "serving");

    let server = Server::builder()
        .listener(listener)
        .routes(table)
        .portal(Portal::new(Arc::new(pages), config.preset.debug))
        .connection_limits(ConnLimits::from(&config.server.http))
        .build();

    match server.launch().await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "server failed");
            ExitCode::FAILURE
        }
    }
}
