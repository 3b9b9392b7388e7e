//! Block validation against its immediate parent

use quorum_common::crypto::{block_digest, verify_signature};
use quorum_common::{Block, PublicKey};

use crate::error::InvalidBlockReason;

/// Check `block` against `parent`.
///
/// Pure: depends only on the two blocks and the keys allowed to produce.
pub fn validate_block(
    block: &Block,
    parent: &Block,
    producers: &[PublicKey],
) -> Result<(), InvalidBlockReason> {
    if block.group_id != parent.group_id {
        return Err(InvalidBlockReason::WrongGroup {
            expected: parent.group_id.clone(),
            got: block.group_id.clone(),
        });
    }

    if block.prev_block_id != parent.block_id {
        return Err(InvalidBlockReason::PrevMismatch {
            expected: parent.block_id,
            got: block.prev_block_id,
        });
    }

    if parent.epoch.checked_add(1) != Some(block.epoch) {
        return Err(InvalidBlockReason::EpochNotSequential {
            parent: parent.epoch,
            got: block.epoch,
        });
    }

    if block.timestamp < parent.timestamp {
        return Err(InvalidBlockReason::TimestampBeforeParent {
            parent: parent.timestamp,
            got: block.timestamp,
        });
    }

    if !producers.contains(&block.producer_pubkey) {
        return Err(InvalidBlockReason::ProducerNotAllowed {
            producer: block.producer_pubkey,
        });
    }

    verify_seal(block)
}

/// Digest and producer signature only; used for the genesis block which
/// has no parent to check against.
pub fn verify_seal(block: &Block) -> Result<(), InvalidBlockReason> {
    let computed =
        block_digest(block).map_err(|e| InvalidBlockReason::Malformed(e.to_string()))?;
    if computed != block.block_id {
        return Err(InvalidBlockReason::DigestMismatch { computed });
    }

    if !verify_signature(&block.producer_pubkey, block.block_id.as_ref(), &block.signature) {
        return Err(InvalidBlockReason::BadSignature);
    }
    Ok(())
}
