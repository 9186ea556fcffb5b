//! Transaction hash generation
//!
//! Every audit row written for one business transaction carries the same
//! opaque transaction hash, which is what transaction-grouped retrieval keys on.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length, in hex characters, of a generated transaction hash
pub const TRANSACTION_HASH_LEN: usize = 40;

/// Generate a fresh transaction hash
///
/// SHA-256 over a random UUID and the current timestamp, hex encoded and
/// truncated to [`TRANSACTION_HASH_LEN`] characters.
pub fn new_transaction_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());

    let mut hash = hex::encode(hasher.finalize());
    hash.truncate(TRANSACTION_HASH_LEN);
    hash
}
