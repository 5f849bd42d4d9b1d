//! Listening socket setup.
//!
//! The socket is configured with socket2 before tokio takes it over:
//! SO_REUSEADDR, SO_KEEPALIVE with the configured probe parameters,
//! TCP_NODELAY, and SO_LINGER with a 15-second linger. Bind or listen
//! failure is fatal; the caller must not continue without a listener.

use crate::config::HttpConfig;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use std::{
    io,
    net::{IpAddr, SocketAddr},
    time::Duration,
};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

const LINGER: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("failed to bind: {0}")]
    Bind(io::Error),

    #[error("failed to accept: {0}")]
    Accept(io::Error),
}

/// The TCP accept socket.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Opens, configures, binds and starts listening on the configured
    /// address. Must run inside a tokio runtime.
    pub fn bind(cfg: &HttpConfig) -> Result<Self, ListenerError> {
        let ip: IpAddr = cfg.ip_address.parse()?;
        let addr = SocketAddr::new(ip, cfg.port);
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket =
            Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(ListenerError::Bind)?;
        socket.set_reuse_address(true).map_err(ListenerError::Bind)?;
        socket.set_nodelay(true).map_err(ListenerError::Bind)?;
        socket.set_keepalive(true).map_err(ListenerError::Bind)?;

        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(cfg.keepalive_idle))
            .with_interval(Duration::from_secs(cfg.keepalive_interval));
        #[cfg(not(windows))]
        let keepalive = keepalive.with_retries(cfg.keepalive_count);
        socket
            .set_tcp_keepalive(&keepalive)
            .map_err(ListenerError::Bind)?;

        socket.set_linger(Some(LINGER)).map_err(ListenerError::Bind)?;
        socket.set_nonblocking(true).map_err(ListenerError::Bind)?;
        socket.bind(&addr.into()).map_err(ListenerError::Bind)?;
        socket
            .listen(cfg.backlog as i32)
            .map_err(ListenerError::Bind)?;

        let inner =
            TcpListener::from_std(socket.into()).map_err(ListenerError::Bind)?;
        info!(address = %addr, backlog = cfg.backlog, "listener bound");

        Ok(Self { inner })
    }

    /// Accepts one connection. NODELAY is applied per accepted stream as
    /// well, since inheritance of listener options is platform-dependent.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let _ = stream.set_nodelay(true);
        debug!(%peer, "connection accepted");
        Ok((stream, peer))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> HttpConfig {
        HttpConfig {
            port: 0,
            ..HttpConfig::default()
        }
    }

    #[tokio::test]
    async fn bind_and_accept() {
        let listener = Listener::bind(&ephemeral_config()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (stream, peer) = listener.accept().await.unwrap();
        assert_eq!(peer.ip(), addr.ip());
        drop(stream);
        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_address_is_fatal() {
        let cfg = HttpConfig {
            ip_address: "not-an-ip".to_string(),
            ..HttpConfig::default()
        };
        assert!(matches!(Listener::bind(&cfg), Err(ListenerError::Addr(_))));
    }
}
