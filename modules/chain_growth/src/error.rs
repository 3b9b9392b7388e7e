//! Error types for chain growth operations.

use quorum_common::{BlockId, PublicKey, TrxId};

use crate::decrypt::DecryptError;

/// Why a block failed validation against its parent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBlockReason {
    #[error("belongs to group {got}, expected {expected}")]
    WrongGroup { expected: String, got: String },

    #[error("prev block id {got} does not match parent {expected}")]
    PrevMismatch { expected: BlockId, got: BlockId },

    #[error("block id does not match content digest {computed}")]
    DigestMismatch { computed: BlockId },

    #[error("header could not be encoded: {0}")]
    Malformed(String),

    #[error("bad producer signature")]
    BadSignature,

    #[error("epoch {got} does not follow parent epoch {parent}")]
    EpochNotSequential { parent: u64, got: u64 },

    #[error("timestamp {got} is earlier than parent timestamp {parent}")]
    TimestampBeforeParent { parent: i64, got: i64 },

    #[error("{producer} is not an eligible producer")]
    ProducerNotAllowed { producer: PublicKey },
}

/// Errors returned by [`ChainGrowthEngine`](crate::chain_engine::ChainGrowthEngine).
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Already committed; nothing to do.
    #[error("block {id} already on chain")]
    DuplicateBlock { id: BlockId },

    /// Already waiting in cache; nothing to do.
    #[error("block {id} already cached")]
    DuplicateCachedBlock { id: BlockId },

    /// Parent unknown; the block stays cached until the parent is synced.
    #[error("parent {parent} of block {id} not found")]
    ParentMissing { id: BlockId, parent: BlockId },

    /// Validation failed; the block stays cached and is never promoted.
    #[error("block {id} is invalid: {reason}")]
    InvalidBlock {
        id: BlockId,
        reason: InvalidBlockReason,
    },

    /// A trx in the block could not be decrypted; the block stays cached.
    #[error("could not decrypt trx {trx}")]
    DecryptionFailed {
        trx: TrxId,
        #[source]
        source: DecryptError,
    },

    /// Retry requested for a block that is not in cache.
    #[error("block {id} not in cache")]
    NotCached { id: BlockId },

    #[error("genesis block rejected: {0}")]
    BadGenesis(String),

    #[error("chain store: {0}")]
    Store(#[from] anyhow::Error),
}

impl ChainError {
    /// Conditions that occur in normal operation and only need logging
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ChainError::DuplicateBlock { .. }
                | ChainError::DuplicateCachedBlock { .. }
                | ChainError::ParentMissing { .. }
        )
    }
}
