//! Identifier generation for canvas objects.
//!
//! Editors receive an [`IdGenerator`] instead of minting ids themselves so
//! tests can supply deterministic ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Counter-backed ids: `00000000-0000-0000-0000-000000000001`, `...02`, and so on.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.saturating_sub(1)),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(n as u128)
    }
}

pub fn random_ids() -> Arc<dyn IdGenerator> {
    Arc::new(RandomIds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_deterministic() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id(), Uuid::from_u128(1));
        assert_eq!(ids.next_id(), Uuid::from_u128(2));

        let ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next_id(), Uuid::from_u128(10));
    }

    #[test]
    fn random_ids_differ() {
        let ids = RandomIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
