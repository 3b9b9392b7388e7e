//! Observer trait for chain growth events.

use quorum_common::{BlockId, PublicKey};

/// Callback receiver for chain growth events.
///
/// The group runtime implements this to publish the new tip to peers and
/// to reconfigure consensus when the producer set changes.
pub trait ChainObserver: Send + Sync {
    /// The committed chain was extended or switched.
    ///
    /// Called once per accepted batch, after every block of the batch that
    /// could be applied has been promoted.
    fn height_changed(&self, height: u64, tip: BlockId);

    /// A PRODUCER trx changed the eligible producer list.
    fn producers_changed(&self, _producers: &[PublicKey]) {}
}

/// Observer that ignores everything
pub struct NoOpObserver;

impl ChainObserver for NoOpObserver {
    fn height_changed(&self, _height: u64, _tip: BlockId) {}
}
