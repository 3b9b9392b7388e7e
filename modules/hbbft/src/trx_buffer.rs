//! Pending trxs waiting to be proposed

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use quorum_common::{Trx, TrxId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::BufferError;

struct Inner {
    trxs: BTreeMap<TrxId, Trx>,
    rng: ChaCha8Rng,
}

/// Trxs keyed by id. Every operation is one step under one lock.
pub struct TrxBuffer {
    inner: Mutex<Inner>,
}

impl TrxBuffer {
    /// Buffer sampling from an entropy-seeded RNG
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Buffer whose sampling sequence is reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                trxs: BTreeMap::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a trx, returning the new length
    pub fn push(&self, trx: Trx) -> Result<usize, BufferError> {
        let mut inner = self.lock();
        if inner.trxs.contains_key(&trx.trx_id) {
            return Err(BufferError::Duplicate(trx.trx_id));
        }
        inner.trxs.insert(trx.trx_id, trx);
        Ok(inner.trxs.len())
    }

    /// Remove a trx; false if it was not buffered
    pub fn delete(&self, id: &TrxId) -> bool {
        self.lock().trxs.remove(id).is_some()
    }

    pub fn contains(&self, id: &TrxId) -> bool {
        self.lock().trxs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().trxs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `n` distinct trxs chosen at random; nothing is removed
    pub fn sample_random(&self, n: usize) -> Vec<Trx> {
        let mut inner = self.lock();
        let Inner { trxs, rng } = &mut *inner;
        let all: Vec<&Trx> = trxs.values().collect();
        let amount = n.min(all.len());
        rand::seq::index::sample(rng, all.len(), amount)
            .into_iter()
            .map(|i| all[i].clone())
            .collect()
    }
}

impl Default for TrxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_test_utils::plain_trx;
    use std::collections::HashSet;

    #[test]
    fn push_is_idempotent() {
        let buffer = TrxBuffer::with_seed(1);
        assert_eq!(buffer.push(plain_trx(1)), Ok(1));
        assert_eq!(buffer.push(plain_trx(1)), Err(BufferError::Duplicate(plain_trx(1).trx_id)));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn delete_of_absent_is_noop() {
        let buffer = TrxBuffer::with_seed(1);
        buffer.push(plain_trx(1)).unwrap();
        assert!(!buffer.delete(&plain_trx(2).trx_id));
        assert!(buffer.delete(&plain_trx(1).trx_id));
        assert!(buffer.is_empty());
    }

    #[test]
    fn sample_is_distinct_and_bounded() {
        let buffer = TrxBuffer::with_seed(7);
        for n in 0..10 {
            buffer.push(plain_trx(n)).unwrap();
        }
        let sample = buffer.sample_random(4);
        assert_eq!(sample.len(), 4);
        let ids: HashSet<TrxId> = sample.iter().map(|t| t.trx_id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(buffer.len(), 10);

        assert_eq!(buffer.sample_random(50).len(), 10);
        assert!(TrxBuffer::with_seed(7).sample_random(3).is_empty());
    }

    #[test]
    fn same_seed_same_sample() {
        let a = TrxBuffer::with_seed(99);
        let b = TrxBuffer::with_seed(99);
        for n in 0..20 {
            a.push(plain_trx(n)).unwrap();
            b.push(plain_trx(n)).unwrap();
        }
        assert_eq!(a.sample_random(5), b.sample_random(5));
    }

    #[test]
    fn concurrent_pushes_conserve_trxs() {
        let buffer = std::sync::Arc::new(TrxBuffer::with_seed(3));
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for n in 0..25u8 {
                        let _ = buffer.push(plain_trx(t * 25 + n));
                        let _ = buffer.push(plain_trx(n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.len(), 100);
    }
}
