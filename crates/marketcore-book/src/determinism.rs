//! Determinism verification utilities for cross-node consistency.
//!
//! Every node processing the same command stream must emit the exact same
//! event sequence. The event root is a SHA-256 over the canonical JSON of
//! each event, length-prefixed and domain-separated, so two nodes can
//! compare a single 32-byte value instead of full payloads.

use marketcore_types::{Event, MarketcoreError, Result};
use sha2::{Digest, Sha256};

const DOMAIN: &[u8] = b"marketcore:event_root:v1:";

/// Compute the root hash over an ordered event sequence.
///
/// The same events in the same order always produce the same root; any
/// reordering changes it.
pub fn compute_event_root(events: &[Event]) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    hasher.update((events.len() as u64).to_le_bytes());

    for event in events {
        let bytes = serde_json::to_vec(event)
            .map_err(|e| MarketcoreError::Internal(format!("event serialization failed: {e}")))?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    Ok(root)
}

/// Hex form of [`compute_event_root`], for logs.
pub fn event_root_hex(events: &[Event]) -> Result<String> {
    compute_event_root(events).map(hex::encode)
}

/// Recompute the root from `events` and compare with `expected_root`.
#[must_use]
pub fn verify_event_root(events: &[Event], expected_root: &[u8; 32]) -> bool {
    compute_event_root(events).is_ok_and(|actual| actual == *expected_root)
}

/// Fold one more event into a running root: `H(DOMAIN ‖ prev ‖ len ‖ event)`.
///
/// Lets a long-lived market keep a constant-size digest of everything it
/// has emitted without retaining the events.
pub fn chain_event_root(prev: &[u8; 32], event: &Event) -> Result<[u8; 32]> {
    let bytes = serde_json::to_vec(event)
        .map_err(|e| MarketcoreError::Internal(format!("event serialization failed: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    hasher.update(prev);
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(&bytes);

    let mut root = [0u8; 32];
    root.copy_from_slice(&hasher.finalize());
    Ok(root)
}
