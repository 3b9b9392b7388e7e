//! Chain growth engine: links accepted blocks into a group's chain.
//!
//! Blocks arrive in any order. A block whose parent is unknown waits in
//! the cache tier; once its parent is committed, it and every cached
//! descendant now connected are validated, applied and promoted to the
//! chain tier, parent before child. The canonical tip is the highest
//! block by height derived from parent links. A branch that falls below
//! the recorded tip stays committed, and this node's trxs in it are put
//! back into consensus; a branch that only ties the tip is left alone.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;
use quorum_common::{
    Block, BlockId, ChainInfo, ChainTip, GroupChainState, PublicKey, Trx, TrxId, TrxSender,
};
use tracing::{debug, info, info_span, warn};

use crate::apply::apply_block;
use crate::configuration::ChainGrowthConfig;
use crate::decrypt::Decryptor;
use crate::error::ChainError;
use crate::observer::ChainObserver;
use crate::stores::{BlockLocation, ChainStore};
use crate::validation::{validate_block, verify_seal};

/// Shared, read-mostly view of a group's chain state.
///
/// Only the engine writes through it; consensus reads the tip via
/// [`ChainInfo`].
#[derive(Clone, Default)]
pub struct ChainStateHandle(Arc<RwLock<GroupChainState>>);

impl ChainStateHandle {
    pub fn new(state: GroupChainState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn snapshot(&self) -> GroupChainState {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut GroupChainState)) {
        f(&mut self.0.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ChainInfo for ChainStateHandle {
    fn chain_tip(&self) -> ChainTip {
        self.0.read().unwrap_or_else(PoisonError::into_inner).tip()
    }
}

/// Result of a successful accept or retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// Blocks moved from cache to chain, parent first
    pub promoted: Vec<BlockId>,
    /// Canonical tip afterwards
    pub tip: ChainTip,
    /// Trxs handed back to consensus
    pub resent: Vec<TrxId>,
}

pub struct ChainGrowthEngine {
    config: ChainGrowthConfig,
    state: ChainStateHandle,
    store: Arc<dyn ChainStore>,
    decryptor: Arc<dyn Decryptor>,
    sender: Arc<dyn TrxSender>,
    observer: Arc<dyn ChainObserver>,

    /// Derived heights of committed blocks, filled lazily
    heights: HashMap<BlockId, u64>,
}

impl ChainGrowthEngine {
    pub fn new(
        config: ChainGrowthConfig,
        state: GroupChainState,
        store: Arc<dyn ChainStore>,
        decryptor: Arc<dyn Decryptor>,
        sender: Arc<dyn TrxSender>,
        observer: Arc<dyn ChainObserver>,
    ) -> Self {
        Self {
            config,
            state: ChainStateHandle::new(state),
            store,
            decryptor,
            sender,
            observer,
            heights: HashMap::new(),
        }
    }

    /// Handle for readers of the chain state
    pub fn state_handle(&self) -> ChainStateHandle {
        self.state.clone()
    }

    pub fn tip(&self) -> ChainTip {
        self.state.chain_tip()
    }

    /// Replace the group cipher key, e.g. after a key rotation. Blocks that
    /// failed to decrypt can then be retried with [`Self::retry_cached`].
    pub fn update_cipher_key(&mut self, key: Vec<u8>) {
        info!(group = %self.config.group_id, "group cipher key updated");
        self.state.update(|state| state.cipher_key = key);
    }

    /// Commit the group's first block. It must be sealed by the owner.
    pub fn commit_genesis(&mut self, genesis: Block) -> Result<(), ChainError> {
        let state = self.state.snapshot();
        if !genesis.is_genesis() {
            return Err(ChainError::BadGenesis(format!(
                "block {} has parent {}",
                genesis.block_id, genesis.prev_block_id
            )));
        }
        if genesis.producer_pubkey != state.owner_pubkey {
            return Err(ChainError::BadGenesis(format!(
                "produced by {}, not the group owner",
                genesis.producer_pubkey
            )));
        }
        verify_seal(&genesis).map_err(|reason| ChainError::BadGenesis(reason.to_string()))?;
        if self.store.block_exists(&genesis.block_id, BlockLocation::Chain)? {
            return Err(ChainError::DuplicateBlock {
                id: genesis.block_id,
            });
        }

        self.store.put_block(&genesis, BlockLocation::Chain)?;
        self.heights.insert(genesis.block_id, 0);
        self.state.update(|state| {
            state.highest_height = 0;
            state.highest_block_id = genesis.block_id;
        });
        info!(group = %self.config.group_id, genesis = %genesis.block_id, "genesis committed");
        self.observer.height_changed(0, genesis.block_id);
        Ok(())
    }

    /// Accept a block received from the network or from local production.
    pub fn accept_block(&mut self, block: Block) -> Result<AcceptOutcome, ChainError> {
        let span = info_span!("chain_growth.accept", block = %block.block_id, epoch = block.epoch);
        let _entered = span.enter();

        let id = block.block_id;
        if self.store.block_exists(&id, BlockLocation::Chain)? {
            debug!("block already on chain");
            return Err(ChainError::DuplicateBlock { id });
        }
        if self.store.block_exists(&id, BlockLocation::Cache)? {
            debug!("block already cached");
            return Err(ChainError::DuplicateCachedBlock { id });
        }

        self.store.put_block(&block, BlockLocation::Cache)?;
        self.link(block)
    }

    /// Try again to link a block that is waiting in cache.
    pub fn retry_cached(&mut self, id: &BlockId) -> Result<AcceptOutcome, ChainError> {
        let span = info_span!("chain_growth.retry", block = %id);
        let _entered = span.enter();

        let block = self
            .store
            .get_block(id, BlockLocation::Cache)?
            .ok_or(ChainError::NotCached { id: *id })?;
        self.link(block)
    }

    fn unchanged(&self) -> AcceptOutcome {
        AcceptOutcome {
            promoted: Vec::new(),
            tip: self.tip(),
            resent: Vec::new(),
        }
    }

    fn eligible_producers(&self) -> Vec<PublicKey> {
        let state = self.state.snapshot();
        let mut producers = state.producers;
        if !producers.contains(&state.owner_pubkey) {
            producers.push(state.owner_pubkey);
        }
        producers
    }

    /// Steps from parent lookup to finalize, for a block already in cache
    fn link(&mut self, block: Block) -> Result<AcceptOutcome, ChainError> {
        let id = block.block_id;
        let parent_in_chain = self.store.parent_exists(&block, BlockLocation::Chain)?;
        let location = if parent_in_chain {
            BlockLocation::Chain
        } else {
            BlockLocation::Cache
        };
        let Some(parent) = self.store.get_block(&block.prev_block_id, location)? else {
            info!(parent = %block.prev_block_id, "parent not found, backward sync needed");
            return Err(ChainError::ParentMissing {
                id,
                parent: block.prev_block_id,
            });
        };

        if let Err(reason) = validate_block(&block, &parent, &self.eligible_producers()) {
            warn!(%reason, "invalid block left in cache");
            return Err(ChainError::InvalidBlock { id, reason });
        }

        if !parent_in_chain {
            debug!(parent = %parent.block_id, "parent still cached, waiting");
            return Ok(self.unchanged());
        }

        let gathered = self.store.gather_connected(&block, BlockLocation::Cache)?;
        debug!(count = gathered.len(), "gathered connected blocks");

        let mut promoted: Vec<Block> = Vec::new();
        let mut first_error = None;
        for candidate in gathered {
            if candidate.block_id != id {
                let Some(parent) = promoted.iter().find(|b| b.block_id == candidate.prev_block_id)
                else {
                    debug!(block = %candidate.block_id, "parent not promoted, left in cache");
                    continue;
                };
                if let Err(reason) =
                    validate_block(&candidate, parent, &self.eligible_producers())
                {
                    warn!(block = %candidate.block_id, %reason, "invalid descendant left in cache");
                    continue;
                }
            }

            match self.apply_and_promote(&candidate) {
                Ok(()) => promoted.push(candidate),
                Err(e) => {
                    warn!(block = %candidate.block_id, error = %e, "block not applied, left in cache");
                    first_error.get_or_insert(e);
                }
            }
        }

        if promoted.is_empty() {
            return match first_error {
                Some(e) => Err(e),
                None => Ok(self.unchanged()),
            };
        }

        let outcome = self.settle(&promoted)?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    fn apply_and_promote(&mut self, block: &Block) -> Result<(), ChainError> {
        let state = self.state.snapshot();
        let report = apply_block(block, &state, self.store.as_ref(), self.decryptor.as_ref())?;

        self.store.put_block(block, BlockLocation::Chain)?;
        self.store.remove_block(&block.block_id, BlockLocation::Cache)?;
        info!(
            block = %block.block_id,
            applied = report.applied,
            refreshed = report.refreshed,
            "block promoted to chain"
        );

        if report.producers_updated {
            self.reload_producers()?;
        }
        Ok(())
    }

    fn reload_producers(&mut self) -> Result<(), ChainError> {
        let producers = self.store.producers()?;
        info!(count = producers.len(), "producer list updated");
        self.state.update(|state| state.producers = producers.clone());
        self.observer.producers_changed(&producers);
        Ok(())
    }

    /// Height recalculation, trim of losing blocks and finalize
    fn settle(&mut self, promoted: &[Block]) -> Result<AcceptOutcome, ChainError> {
        let old_tip = self.tip();

        let mut best: Option<ChainTip> = None;
        for block in promoted {
            let height = self.height_of(&block.block_id)?;
            if best.map_or(true, |b| height > b.height) {
                best = Some(ChainTip {
                    height,
                    block_id: block.block_id,
                });
            }
        }
        let new_tip = match best {
            Some(best) if best.height > old_tip.height => best,
            _ => old_tip,
        };
        debug!(
            old_height = old_tip.height,
            new_height = new_tip.height,
            "height recalculated"
        );

        // Every promoted block descends from the first one
        let fork = self.common_ancestor(promoted[0].prev_block_id, old_tip.block_id)?;
        let canonical = self.segment(new_tip.block_id, fork)?;
        let abandoned = self.segment(old_tip.block_id, fork)?;

        // Promoted branches are trimmed only when they stay below the tip
        // recorded before this batch; a tie trims nothing
        let reach = self.branch_reach(promoted)?;
        let canonical_ids: HashSet<BlockId> = canonical.iter().map(|b| b.block_id).collect();
        let losing: Vec<&Block> = abandoned
            .iter()
            .chain(
                promoted
                    .iter()
                    .filter(|b| reach.get(&b.block_id).is_some_and(|h| *h < old_tip.height)),
            )
            .filter(|b| !canonical_ids.contains(&b.block_id))
            .collect();

        let mut resent = Vec::new();
        if !losing.is_empty() {
            info!(
                fork = %fork,
                losing = losing.len(),
                "blocks left off the canonical chain"
            );
            let canonical_trxs: HashSet<TrxId> =
                canonical.iter().flat_map(|b| b.trxs.iter().map(|t| t.trx_id)).collect();
            resent = self.resend_local_trxs(&losing, &canonical_trxs);
        }

        if new_tip != old_tip {
            self.state.update(|state| {
                state.highest_height = new_tip.height;
                state.highest_block_id = new_tip.block_id;
            });
        }
        info!(height = new_tip.height, tip = %new_tip.block_id, "chain updated");
        self.observer.height_changed(new_tip.height, new_tip.block_id);

        Ok(AcceptOutcome {
            promoted: promoted.iter().map(|b| b.block_id).collect(),
            tip: new_tip,
            resent,
        })
    }

    /// Highest height reached through each promoted block by the promoted
    /// blocks descending from it
    fn branch_reach(&mut self, promoted: &[Block]) -> Result<HashMap<BlockId, u64>, ChainError> {
        let mut reach = HashMap::new();
        for block in promoted {
            let height = self.height_of(&block.block_id)?;
            reach.insert(block.block_id, height);
        }
        // Parent before child, so walking backwards folds children first
        for block in promoted.iter().rev() {
            let Some(&below) = reach.get(&block.block_id) else {
                continue;
            };
            if let Some(parent) = reach.get_mut(&block.prev_block_id) {
                *parent = (*parent).max(below);
            }
        }
        Ok(reach)
    }

    fn resend_local_trxs(&self, losing: &[&Block], canonical: &HashSet<TrxId>) -> Vec<TrxId> {
        if !self.config.resend_local_trxs {
            debug!("resend disabled");
            return Vec::new();
        }

        let me = self.state.snapshot().user_sign_pubkey;
        let mut seen = HashSet::new();
        let mut trxs: Vec<Trx> = Vec::new();
        for trx in losing.iter().flat_map(|b| b.trxs.iter()) {
            if trx.sender_pubkey != me
                || canonical.contains(&trx.trx_id)
                || !seen.insert(trx.trx_id)
            {
                continue;
            }
            if trx.resend_count >= self.config.max_resend_count {
                warn!(
                    trx = %trx.trx_id,
                    resend_count = trx.resend_count,
                    "trx reached resend limit, dropped"
                );
                continue;
            }
            let mut trx = trx.clone();
            trx.resend_count += 1;
            trxs.push(trx);
        }

        if trxs.is_empty() {
            return Vec::new();
        }
        let ids: Vec<TrxId> = trxs.iter().map(|t| t.trx_id).collect();
        info!(count = ids.len(), "resending local trxs from abandoned blocks");
        if let Err(e) = self.sender.resend_trxs(trxs) {
            warn!(error = %e, "could not resend trxs");
            return Vec::new();
        }
        ids
    }

    fn chain_block(&self, id: &BlockId) -> Result<Block, ChainError> {
        self.store
            .get_block(id, BlockLocation::Chain)?
            .ok_or_else(|| ChainError::Store(anyhow!("block {id} missing from chain")))
    }

    /// Height of a committed block: zero for genesis, else parent + 1
    fn height_of(&mut self, id: &BlockId) -> Result<u64, ChainError> {
        let mut path = Vec::new();
        let mut current = *id;
        let base = loop {
            if let Some(height) = self.heights.get(&current) {
                break *height;
            }
            let block = self.chain_block(&current)?;
            if block.is_genesis() {
                self.heights.insert(current, 0);
                break 0;
            }
            path.push(current);
            current = block.prev_block_id;
        };

        let mut height = base;
        for id in path.into_iter().rev() {
            height += 1;
            self.heights.insert(id, height);
        }
        Ok(height)
    }

    /// Deepest committed block that is an ancestor of (or equal to) both
    fn common_ancestor(&mut self, a: BlockId, b: BlockId) -> Result<BlockId, ChainError> {
        let mut ha = self.height_of(&a)?;
        let mut hb = self.height_of(&b)?;
        let (mut a, mut b) = (a, b);

        while ha > hb {
            a = self.chain_block(&a)?.prev_block_id;
            ha -= 1;
        }
        while hb > ha {
            b = self.chain_block(&b)?.prev_block_id;
            hb -= 1;
        }
        while a != b {
            a = self.chain_block(&a)?.prev_block_id;
            b = self.chain_block(&b)?.prev_block_id;
        }
        Ok(a)
    }

    /// Committed blocks from `tip` down to, not including, `ancestor`
    fn segment(&self, tip: BlockId, ancestor: BlockId) -> Result<Vec<Block>, ChainError> {
        let mut blocks = Vec::new();
        let mut current = tip;
        while current != ancestor {
            let block = self.chain_block(&current)?;
            current = block.prev_block_id;
            blocks.push(block);
        }
        Ok(blocks)
    }
}
