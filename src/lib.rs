//! KVST - Sharded, Durable, TCP Key-Value Store
//!
//! A single-node in-memory key-value store reachable over TCP via a
//! length-prefixed binary protocol, durable via an append-only log (AOL)
//! replayed on startup.
//!
//! ## Components
//! - **Sharded map** ([`store::ShardedMap`]): concurrent in-memory store,
//!   partitioned into power-of-two shards to reduce lock contention.
//! - **AOL writer/reader** ([`durability`]): durability log, one record per
//!   applied mutation, replayed sequentially at startup.
//! - **Wire codec** ([`protocol`]): fixed 16-byte request/response headers.
//! - **Server** ([`server::Server`]): accept loop, fixed worker pool,
//!   per-connection request pipeline.
//!
//! ## Example
//! ```no_run
//! use kvst::{config::ServerConfig, server::Server};
//!
//! let config = ServerConfig::default();
//! let server = Server::open(config).unwrap();
//! server.run().unwrap();
//! ```

pub mod config;
pub mod durability;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod store;
pub mod types;
