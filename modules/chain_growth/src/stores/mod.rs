use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use quorum_common::{Block, BlockId, PublicKey, Trx, TrxId};

mod memory;

pub use memory::MemoryChainStore;

/// Storage tier of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockLocation {
    /// Received but not linked to the committed chain
    Cache,
    /// Linked and applied
    Chain,
}

/// Persistent state of one group's chain
///
/// Calls are synchronous and may block on I/O. Implementations do not
/// retry; a failure is reported to the caller as is.
pub trait ChainStore: Send + Sync {
    fn block_exists(&self, id: &BlockId, location: BlockLocation) -> Result<bool>;
    fn get_block(&self, id: &BlockId, location: BlockLocation) -> Result<Option<Block>>;
    fn put_block(&self, block: &Block, location: BlockLocation) -> Result<()>;
    fn remove_block(&self, id: &BlockId, location: BlockLocation) -> Result<()>;

    fn parent_exists(&self, block: &Block, location: BlockLocation) -> Result<bool> {
        self.block_exists(&block.prev_block_id, location)
    }

    /// Direct children of `id` in `location`, in a stable order
    fn get_children(&self, id: &BlockId, location: BlockLocation) -> Result<Vec<Block>>;

    /// `root` followed by all its descendants in `location`, each block
    /// after its parent
    fn gather_connected(&self, root: &Block, location: BlockLocation) -> Result<Vec<Block>> {
        let mut seen = HashSet::from([root.block_id]);
        let mut gathered = vec![root.clone()];
        let mut queue = VecDeque::from([root.block_id]);
        while let Some(id) = queue.pop_front() {
            for child in self.get_children(&id, location)? {
                if seen.insert(child.block_id) {
                    queue.push_back(child.block_id);
                    gathered.push(child);
                }
            }
        }
        Ok(gathered)
    }

    fn trx_exists(&self, id: &TrxId) -> Result<bool>;

    /// Record a trx as applied, or refresh its metadata if already known
    fn put_trx(&self, trx: &Trx) -> Result<()>;

    fn apply_post(&self, trx: &Trx, plaintext: &[u8]) -> Result<()>;
    fn apply_permission_update(&self, trx: &Trx, plaintext: &[u8]) -> Result<()>;
    fn apply_producer_update(&self, trx: &Trx, plaintext: &[u8]) -> Result<()>;
    fn apply_announcement(&self, trx: &Trx, plaintext: &[u8]) -> Result<()>;
    fn apply_schema_update(&self, trx: &Trx, plaintext: &[u8]) -> Result<()>;

    /// Producers added through PRODUCER trxs
    fn producers(&self) -> Result<Vec<PublicKey>>;
}
