//! KVST - Core Type Definitions
//! Defines fundamental types used across the store.

/// Key type for the store. Opaque to the system; 1..65535 bytes on the wire.
pub type Key = Vec<u8>;

/// Value type for the store. Opaque to the system; 0..2^32-1 bytes on the wire.
pub type Value = Vec<u8>;

/// Nanoseconds since the Unix epoch, used only as informational metadata on
/// AOL records. Never consulted for ordering or conflict resolution.
pub fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
