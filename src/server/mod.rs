//! KVST - Server & Worker Pool (C5)
//! Owns the listening socket, the shared map and AOL writer, the stop
//! flag, and the fixed worker pool. Wires the four other components
//! together: the acceptor hands every connection to a worker, which
//! drains it via [`connection::handle_connection`].

mod connection;
mod pool;

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use connection::ConnectionContext;
use pool::ThreadPool;

use crate::config::ServerConfig;
use crate::durability::{self, AolWriter};
use crate::error::{KvError, Result};
use crate::metrics::ServerMetrics;
use crate::store::ShardedMap;

/// The running server: listening socket, shared collaborators, stop flag,
/// and worker pool. Exists from [`Server::open`] until [`Server::stop`]
/// returns.
pub struct Server {
    listener: TcpListener,
    map: Arc<ShardedMap>,
    writer: Arc<Mutex<AolWriter>>,
    metrics: Arc<ServerMetrics>,
    pool: Mutex<ThreadPool>,
    stop_flag: Arc<AtomicBool>,
}

impl Server {
    /// Open the listening socket, recover the map from the AOL at
    /// `config.aol_path`, and spin up the worker pool. Does not accept
    /// connections yet — call [`Server::run`] for that.
    pub fn open(config: ServerConfig) -> Result<Self> {
        if config.shard_count == 0 || !config.shard_count.is_power_of_two() {
            return Err(KvError::Config(format!(
                "shard_count must be a positive power of two, got {}",
                config.shard_count
            )));
        }

        let map = Arc::new(ShardedMap::new(config.shard_count));

        log::info!("recovering from AOL at {:?}", config.aol_path);
        durability::recover(&config.aol_path, &map)?;
        log::info!("recovery complete, {} keys loaded", map.total_size());

        let writer = Arc::new(Mutex::new(AolWriter::open(
            &config.aol_path,
            config.sync_writes,
        )?));

        let listener = TcpListener::bind(("0.0.0.0", config.port))?;
        log::info!("listening on port {}", config.port);

        let pool = ThreadPool::new(config.worker_count);

        Ok(Self {
            listener,
            map,
            writer,
            metrics: Arc::new(ServerMetrics::new()),
            pool: Mutex::new(pool),
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A clone of the stop flag, for wiring into a signal handler. Setting
    /// it alone does not unblock `accept`; callers must also drop or
    /// otherwise interrupt the listener (this crate's `main` calls
    /// [`Server::stop`] instead, which does both).
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    /// Metrics handle. `main` logs [`ServerMetrics::report`] from this on
    /// shutdown.
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Block accepting connections until [`Server::stop`] is called from
    /// another thread, or an unrecoverable accept error occurs.
    pub fn run(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            // `stop()` unblocks a thread parked in `accept` by connecting
            // to the listener's own address, which `incoming()` yields as
            // an ordinary `Ok(stream)` — not an error — since nothing
            // actually closes the listener. The flag must be checked
            // before a stream is ever submitted to the pool, or the
            // self-connect is dispatched like real traffic and `accept`
            // is called again, blocking forever for the next real client.
            if self.stop_flag.load(Ordering::SeqCst) {
                log::info!("accept loop stopping");
                break;
            }

            match stream {
                Ok(stream) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        log::warn!("failed to set TCP_NODELAY: {err}");
                    }

                    let ctx = ConnectionContext {
                        map: Arc::clone(&self.map),
                        writer: Arc::clone(&self.writer),
                        metrics: Arc::clone(&self.metrics),
                        trigger_fatal_shutdown: self.fatal_shutdown_trigger(),
                    };

                    let pool = self.pool.lock().expect("pool lock poisoned");
                    pool.submit(move || connection::handle_connection(stream, ctx));
                }
                Err(err) => {
                    log::warn!("accept error: {err}");
                }
            }
        }
        Ok(())
    }

    /// A callback a connection can invoke when the AOL writer hits an I/O
    /// error, escalating a per-connection failure to a full shutdown
    /// (§7: AOL I/O errors are fatal to the whole server). Runs inside a
    /// worker thread, so it must not join the pool it is itself a part of
    /// — it only raises the flag and unblocks the acceptor, the same
    /// signal-safe subset §9 allows a real signal handler. The remaining
    /// drain-and-flush happens when `run()` returns and the caller (this
    /// crate's `main`) calls `stop()` to finish the job.
    fn fatal_shutdown_trigger(&self) -> Arc<dyn Fn() + Send + Sync> {
        let stop_flag = Arc::clone(&self.stop_flag);
        let local_addr = self.listener.local_addr().ok();
        Arc::new(move || {
            stop_flag.store(true, Ordering::SeqCst);
            if let Some(addr) = local_addr {
                let _ = std::net::TcpStream::connect(addr);
            }
        })
    }

    /// Stop accepting new connections, drain the worker pool, and flush
    /// the AOL writer. Safe to call repeatedly (each step is idempotent)
    /// and from a dedicated signal-handling thread while `run()` blocks on
    /// the acceptor thread — but never from inside a worker thread itself,
    /// since draining joins every worker and a thread cannot join itself.
    pub fn stop(&self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);

        // `TcpListener` has no explicit close, and a self-connect comes
        // back out of `incoming()` as an ordinary `Ok(stream)`, not an
        // error. Setting the flag above first, then connecting, guarantees
        // `run`'s loop observes the flag on the very iteration that accepts
        // this connection rather than dispatching it as real traffic.
        if let Ok(local_addr) = self.listener.local_addr() {
            let _ = std::net::TcpStream::connect(local_addr);
        }

        self.pool.lock().expect("pool lock poisoned").shutdown();

        log::info!("flushing AOL before shutdown");
        self.writer.lock().expect("aol writer lock poisoned").flush()?;

        Ok(())
    }
}
