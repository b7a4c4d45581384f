//! KVST - In-Memory Store Module (C1)

mod map;

pub use map::ShardedMap;
