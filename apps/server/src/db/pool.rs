//! Bounded datastore connection pool
//!
//! Exists to bound concurrent Postgres connections under bursty search
//! traffic. Reuses an idle connection when one exists, creates new ones up to
//! `max_size`, then queues callers FIFO until a connection is released or the
//! acquire timeout elapses. A periodic sweep closes connections idle longer
//! than `idle_timeout`, never shrinking below `min_size`.
//!
//! The pool is generic over a [`ConnectionFactory`] so the acquire/release
//! machinery is tested against a fake factory; production code uses
//! [`PgConnectionFactory`].

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection as _};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::DatabaseConfig;
use crate::{Error, Result};

#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self) -> Result<Self::Connection>;

    /// Gracefully close a connection taken out of circulation.
    async fn close(&self, conn: Self::Connection) {
        drop(conn);
    }
}

/// Factory for raw Postgres connections.
pub struct PgConnectionFactory {
    options: PgConnectOptions,
}

impl PgConnectionFactory {
    pub fn from_url(url: &str) -> Result<Self> {
        let options = PgConnectOptions::from_str(url).map_err(Error::Database)?;
        Ok(Self { options })
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection> {
        let conn = self.options.connect().await.map_err(Error::Database)?;
        Ok(conn)
    }

    /// Terminate the session cleanly rather than by TCP reset.
    async fn close(&self, conn: PgConnection) {
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Connection close failed");
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(db: &DatabaseConfig) -> Self {
        Self {
            min_size: db.pool_min_size,
            max_size: db.pool_max_size,
            acquire_timeout: Duration::from_secs(db.pool_acquire_timeout_seconds),
            idle_timeout: Duration::from_secs(db.pool_idle_timeout_seconds),
            sweep_interval: Duration::from_secs(db.pool_sweep_interval_seconds),
        }
    }
}

/// Point-in-time pool counters, exposed on the health endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PoolStatus {
    pub total: usize,
    pub idle: usize,
    pub waiters: usize,
}

struct IdleConn<C> {
    conn: C,
    since: Instant,
}

struct PoolState<C> {
    idle: Vec<IdleConn<C>>,
    /// Connections alive or being created: idle + checked out + in-flight
    /// creations.
    total: usize,
    /// FIFO queue of parked acquires, keyed so a timed-out waiter can remove
    /// its own entry under the lock.
    waiters: VecDeque<(u64, oneshot::Sender<C>)>,
    next_waiter_id: u64,
    closed: bool,
}

struct Shared<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<F::Connection>>,
}

impl<F: ConnectionFactory> Shared<F> {
    /// Return a connection to the pool, handing it to the oldest live waiter
    /// if any. Called from guard drop, so it must not block. Hands the
    /// connection back to the caller for disposal when the pool is already
    /// shut down.
    fn release(&self, mut conn: F::Connection) -> Option<F::Connection> {
        let mut state = self.state.lock().expect("pool mutex poisoned");

        if state.closed {
            state.total -= 1;
            return Some(conn);
        }

        // Waiters whose acquire was cancelled have dropped their receiver;
        // skip them and keep the connection moving.
        while let Some((_, tx)) = state.waiters.pop_front() {
            match tx.send(conn) {
                Ok(()) => return None,
                Err(returned) => conn = returned,
            }
        }

        state.idle.push(IdleConn {
            conn,
            since: Instant::now(),
        });
        None
    }

    fn forget_failed_create(&self) {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        state.total -= 1;
    }

    /// Close a connection taken out of circulation without blocking the
    /// caller. Outside a runtime the connection is simply dropped.
    fn dispose(self: Arc<Self>, conn: F::Connection) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                self.factory.close(conn).await;
            });
        }
    }
}

/// A connection checked out of the pool. Derefs to the underlying datastore
/// connection and returns it to the pool on drop.
pub struct PooledConnection<F: ConnectionFactory> {
    conn: Option<F::Connection>,
    shared: Arc<Shared<F>>,
}

impl<F: ConnectionFactory> std::fmt::Debug for PooledConnection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already released")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already released")
    }
}

impl<F: ConnectionFactory> PooledConnection<F> {
    /// Take this connection out of circulation instead of repooling it.
    ///
    /// A query cancelled mid-flight can leave the wire protocol in an
    /// undefined state; such a connection must never be handed to another
    /// caller. When waiters are parked, a replacement is created so the
    /// pool's effective capacity is not silently reduced.
    pub fn discard(mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        Arc::clone(&self.shared).dispose(conn);

        let refill = {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            state.total -= 1;
            let refill = !state.closed
                && !state.waiters.is_empty()
                && state.total < self.shared.config.max_size;
            if refill {
                state.total += 1;
            }
            refill
        };

        if refill {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                match shared.factory.connect().await {
                    Ok(conn) => {
                        if let Some(conn) = shared.release(conn) {
                            Arc::clone(&shared).dispose(conn);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to replace a discarded connection");
                        shared.forget_failed_create();
                    }
                }
            });
        }
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Some(conn) = self.shared.release(conn) {
                Arc::clone(&self.shared).dispose(conn);
            }
        }
    }
}

pub struct Pool<F: ConnectionFactory> {
    shared: Arc<Shared<F>>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// The production pool type.
pub type PgPool = Pool<PgConnectionFactory>;
pub type PgPooledConnection = PooledConnection<PgConnectionFactory>;

impl<F: ConnectionFactory> Pool<F> {
    /// Create a pool and start its idle sweep. Connections are established
    /// lazily on first acquire.
    pub fn new(factory: F, config: PoolConfig) -> Arc<Self> {
        let shared = Arc::new(Shared {
            factory,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                total: 0,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
                closed: false,
            }),
        });

        let pool = Arc::new(Self {
            shared,
            sweeper: Mutex::new(None),
        });

        let sweep_pool = Arc::downgrade(&pool);
        let interval = pool.shared.config.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(pool) = sweep_pool.upgrade() else {
                    break;
                };
                pool.sweep_idle();
            }
        });
        *pool.sweeper.lock().expect("pool mutex poisoned") = Some(handle);

        pool
    }

    /// Check a connection out of the pool, waiting up to the configured
    /// acquire timeout when the pool is exhausted.
    pub async fn acquire(&self) -> Result<PooledConnection<F>> {
        enum Plan<C> {
            Reuse(C),
            Create,
            Wait(u64, oneshot::Receiver<C>),
        }

        let plan = {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            if state.closed {
                return Err(Error::PoolClosed);
            }
            if let Some(idle) = state.idle.pop() {
                Plan::Reuse(idle.conn)
            } else if state.total < self.shared.config.max_size {
                state.total += 1;
                Plan::Create
            } else {
                let (tx, rx) = oneshot::channel();
                let waiter_id = state.next_waiter_id;
                state.next_waiter_id += 1;
                state.waiters.push_back((waiter_id, tx));
                Plan::Wait(waiter_id, rx)
            }
        };

        let conn = match plan {
            Plan::Reuse(conn) => conn,
            Plan::Create => match self.shared.factory.connect().await {
                Ok(conn) => conn,
                Err(e) => {
                    self.shared.forget_failed_create();
                    return Err(e);
                }
            },
            Plan::Wait(waiter_id, mut rx) => {
                match tokio::time::timeout(self.shared.config.acquire_timeout, &mut rx).await {
                    Ok(Ok(conn)) => conn,
                    Ok(Err(_)) => return Err(Error::PoolClosed),
                    Err(_) => {
                        // A release can hand over the connection between the
                        // deadline firing and this branch running. Releases
                        // send under the state lock, so removing the waiter
                        // entry under the same lock decides the race: entry
                        // gone means the connection is already in the channel
                        // and must be salvaged, not leaked.
                        let salvaged = {
                            let mut state =
                                self.shared.state.lock().expect("pool mutex poisoned");
                            let pos =
                                state.waiters.iter().position(|(id, _)| *id == waiter_id);
                            match pos {
                                Some(pos) => {
                                    state.waiters.remove(pos);
                                    None
                                }
                                None => rx.try_recv().ok(),
                            }
                        };
                        match salvaged {
                            Some(conn) => conn,
                            None => {
                                tracing::warn!(
                                    timeout = ?self.shared.config.acquire_timeout,
                                    "Pool acquire timed out"
                                );
                                return Err(Error::PoolTimeout(
                                    self.shared.config.acquire_timeout,
                                ));
                            }
                        }
                    }
                }
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Close connections idle longer than `idle_timeout`, retaining at least
    /// `min_size` connections overall.
    pub fn sweep_idle(&self) {
        let evicted = {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            let idle_timeout = self.shared.config.idle_timeout;
            let mut allowance = state.total.saturating_sub(self.shared.config.min_size);
            let mut evicted = Vec::new();

            let mut i = 0;
            while i < state.idle.len() {
                if allowance == 0 {
                    break;
                }
                if state.idle[i].since.elapsed() >= idle_timeout {
                    evicted.push(state.idle.swap_remove(i));
                    allowance -= 1;
                } else {
                    i += 1;
                }
            }
            state.total -= evicted.len();
            evicted
        };

        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "Evicted idle connections");
            for idle in evicted {
                Arc::clone(&self.shared).dispose(idle.conn);
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock().expect("pool mutex poisoned");
        PoolStatus {
            total: state.total,
            idle: state.idle.len(),
            waiters: state.waiters.len(),
        }
    }

    /// Stop the sweep, drop idle connections, and fail all pending and
    /// future acquires.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().expect("pool mutex poisoned").take() {
            handle.abort();
        }

        let (idle, waiters) = {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            state.closed = true;
            state.total -= state.idle.len();
            (
                std::mem::take(&mut state.idle),
                std::mem::take(&mut state.waiters),
            )
        };

        drop(waiters); // receivers observe PoolClosed
        for idle in idle {
            Arc::clone(&self.shared).dispose(idle.conn);
        }
        tracing::info!("Connection pool shut down");
    }
}

impl PgPool {
    pub fn connect(config: &DatabaseConfig) -> Result<Arc<Self>> {
        let factory = PgConnectionFactory::from_url(&config.url)?;
        Ok(Pool::new(factory, PoolConfig::from(config)))
    }
}
