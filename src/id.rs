//! ID generation utilities
//!
//! Session IDs are `{timestamp_ms}-{hash_hex}` where the hash covers the task,
//! the process id and a process-local counter, so two sessions created in the
//! same millisecond still differ.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Generate a unique session ID for a task
///
/// Format: `{timestamp_ms}-{hex}`
/// Example: `1738300800123-9f2c41d7`
pub fn generate_session_id(task: &str) -> String {
    let timestamp = now_ms();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(task.as_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();

    format!("{}-{}", timestamp, hex::encode(&digest[..4]))
}

/// Extract the timestamp portion of a session ID, if it has one
pub fn session_timestamp(session_id: &str) -> Option<u64> {
    session_id.split('-').next().and_then(|s| s.parse().ok())
}
