//! Server shell: worker pool, admission queue, dispatch loop, unbind.
//!
//! Exactly `worker_slots` connection states are allocated at startup and
//! recycled through an [`ArrayQueue`]; accepted sockets queue in a
//! [`SegQueue`] until a slot frees up. When the admission queue overflows,
//! the socket receives an immediate `503` status line and is closed. SIGINT
//! or SIGTERM unbinds: the accept task is cancelled, queued sockets are
//! dropped, and in-flight connections drain through their state machines
//! before the server returns.

use crate::{
    http::types::Status,
    limits::{ConnLimits, ServerLimits, WaitStrategy},
    router::RouteTable,
    server::{connection::Connection, listener::Listener, portal::Portal},
};
use crossbeam::queue::{ArrayQueue, SegQueue};
use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    task::yield_now,
    time::sleep,
};
use tracing::{info, warn};

/// The origin server. Holds the listening socket, the immutable route
/// table, the portal handed to handlers, and the recycled worker states.
pub struct Server {
    listener: Listener,
    table: Arc<RouteTable>,
    portal: Arc<Portal>,
    workers: Arc<ArrayQueue<Connection>>,
    pending: Arc<SegQueue<(TcpStream, SocketAddr)>>,
    limits: ServerLimits,
}

impl Server {
    #[inline(always)]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            table: None,
            portal: None,
            server_limits: None,
            conn_limits: None,
        }
    }

    /// The bound listener address; useful with an ephemeral port.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until SIGINT or SIGTERM, then unbinds and drains.
    pub async fn launch(self) -> io::Result<()> {
        self.run_until(unbind_signal()).await
    }

    /// Serves until `shutdown` resolves. Split out from [`launch`](Self::launch)
    /// so callers and tests can supply their own trigger.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) -> io::Result<()> {
        let slots = self.limits.worker_slots;
        let accept = tokio::spawn(accept_loop(
            self.listener,
            self.pending.clone(),
            self.limits.max_pending,
        ));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                job = pop_pending(&self.pending, &self.limits.wait_strategy) => {
                    let (mut stream, peer) = job;
                    let mut worker = pop_worker(&self.workers, &self.limits.wait_strategy).await;

                    let workers = self.workers.clone();
                    let table = self.table.clone();
                    let portal = self.portal.clone();
                    tokio::spawn(async move {
                        let _ = worker.run(&mut stream, peer, &table, &portal).await;
                        let _ = workers.push(worker);
                    });
                }
            }
        }

        info!("unbinding: listener cancelled");
        accept.abort();
        let _ = accept.await;

        while self.workers.len() < slots {
            sleep(Duration::from_millis(10)).await;
        }
        info!("all connections drained");
        Ok(())
    }
}

async fn accept_loop(
    listener: Listener,
    pending: Arc<SegQueue<(TcpStream, SocketAddr)>>,
    max_pending: usize,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if pending.len() < max_pending {
                    pending.push((stream, peer));
                } else {
                    warn!(%peer, "admission queue full, refusing");
                    tokio::spawn(refuse(stream));
                }
            }
            Err(err) => warn!(%err, "accept failed"),
        }
    }
}

/// Overflow answer: a bare `503` status line, then shutdown.
async fn refuse(mut stream: TcpStream) {
    let _ = stream
        .write_all(Status::ServiceUnavailable.to_first_line())
        .await;
    let _ = stream.shutdown().await;
}

macro_rules! impl_pop_queue {
    ($name:ident, $queue:ident) => {
        async fn $name<V>(queue: &Arc<$queue<V>>, strategy: &WaitStrategy) -> V {
            loop {
                if let Some(value) = queue.pop() {
                    return value;
                }

                match strategy {
                    WaitStrategy::Yield => yield_now().await,
                    WaitStrategy::Sleep(time) => sleep(*time).await,
                }
            }
        }
    };
}

impl_pop_queue! { pop_pending, SegQueue }
impl_pop_queue! { pop_worker, ArrayQueue }

/// Resolves on SIGINT or SIGTERM.
async fn unbind_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => info!("SIGINT received"),
                    _ = terminate.recv() => info!("SIGTERM received"),
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received");
    }
}

/// Builder for [`Server`] instances.
pub struct ServerBuilder {
    listener: Option<Listener>,
    table: Option<RouteTable>,
    portal: Option<Portal>,
    server_limits: Option<ServerLimits>,
    conn_limits: Option<ConnLimits>,
}

impl ServerBuilder {
    /// Sets the bound listening socket. Required.
    #[inline(always)]
    pub fn listener(mut self, listener: Listener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the verified route table. Required.
    #[inline(always)]
    pub fn routes(mut self, table: RouteTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Sets the portal handed to handlers. Defaults to an empty one.
    #[inline(always)]
    pub fn portal(mut self, portal: Portal) -> Self {
        self.portal = Some(portal);
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.conn_limits = Some(limits);
        self
    }

    /// Finalizes the server and pre-allocates the worker pool.
    ///
    /// # Panics
    ///
    /// When `listener` or `routes` was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let listener = self
            .listener
            .expect("The `listener` method must be called to create");
        let table = Arc::new(
            self.table
                .expect("The `routes` method must be called to create"),
        );
        let portal = Arc::new(self.portal.unwrap_or_default());
        let server_limits = self.server_limits.unwrap_or_default();
        let conn_limits = self.conn_limits.unwrap_or_default();

        let workers = ArrayQueue::new(server_limits.worker_slots);
        for _ in 0..server_limits.worker_slots {
            let _ = workers.push(Connection::new(conn_limits.clone()));
        }

        Server {
            listener,
            table,
            portal,
            workers: Arc::new(workers),
            pending: Arc::new(SegQueue::new()),
            limits: server_limits,
        }
    }
}
