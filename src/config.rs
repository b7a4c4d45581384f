//! KVST - Server Configuration
//! Defines tunable parameters for the key-value store.

use std::path::PathBuf;

/// Configuration for the KVST server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the server listens on.
    pub port: u16,

    /// Path to the append-only durability log.
    pub aol_path: PathBuf,

    /// Number of shards in the in-memory map. Must be a power of two.
    pub shard_count: usize,

    /// Number of worker threads in the connection pool. Defaults to the
    /// host's available parallelism.
    pub worker_count: usize,

    /// Whether to `fsync`-equivalent (`sync_data`) every AOL append.
    /// When false, each append is flushed to the OS page cache only.
    pub sync_writes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7878,
            aol_path: PathBuf::from("store.aol"),
            shard_count: 256,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            sync_writes: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with a custom port and AOL path, defaults otherwise.
    pub fn new(port: u16, aol_path: impl Into<PathBuf>) -> Self {
        Self {
            port,
            aol_path: aol_path.into(),
            ..Default::default()
        }
    }

    /// Set the shard count. Must be a power of two; panics otherwise since
    /// this is a startup-time configuration mistake, not a runtime error.
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        assert!(
            shard_count.is_power_of_two(),
            "shard_count must be a power of two, got {shard_count}"
        );
        self.shard_count = shard_count;
        self
    }

    /// Set the worker pool size.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Enable or disable `sync_data` on every AOL append.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}
