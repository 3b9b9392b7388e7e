//! Digest and signature helpers for blocks and trxs

use crate::codec::{to_cbor, CodecError};
use crate::types::{Block, BlockId, PublicKey, Trx, TrxId, TrxType};
use blake2::{digest::consts::U32, Blake2b, Digest};
use cryptoxide::ed25519;

/// Get a Blake2b-256 hash of some bytes
pub fn blake2b_256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(bytes);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

#[derive(minicbor::Encode)]
struct BlockHeader<'a> {
    #[n(0)]
    group_id: &'a str,
    #[n(1)]
    prev_block_id: &'a BlockId,
    #[n(2)]
    epoch: u64,
    #[n(3)]
    timestamp: i64,
    #[n(4)]
    trx_ids: Vec<TrxId>,
    #[n(5)]
    producer_pubkey: &'a PublicKey,
}

#[derive(minicbor::Encode)]
struct TrxHeader<'a> {
    #[n(0)]
    trx_id: &'a TrxId,
    #[n(1)]
    group_id: &'a str,
    #[n(2)]
    trx_type: TrxType,
    #[n(3)]
    sender_pubkey: &'a PublicKey,
    #[n(4)]
    data: &'a [u8],
    #[n(5)]
    timestamp: i64,
}

/// Content digest of a block: Blake2b-256 over the CBOR header, which
/// commits to the ordered trx ids.
pub fn block_digest(block: &Block) -> Result<BlockId, CodecError> {
    let header = BlockHeader {
        group_id: &block.group_id,
        prev_block_id: &block.prev_block_id,
        epoch: block.epoch,
        timestamp: block.timestamp,
        trx_ids: block.trxs.iter().map(|t| t.trx_id).collect(),
        producer_pubkey: &block.producer_pubkey,
    };
    Ok(BlockId::new(blake2b_256(&to_cbor(&header)?)))
}

/// Digest a user signs when creating a trx. `resend_count` is excluded so
/// resent trxs keep a valid signature.
pub fn trx_digest(trx: &Trx) -> Result<[u8; 32], CodecError> {
    let header = TrxHeader {
        trx_id: &trx.trx_id,
        group_id: &trx.group_id,
        trx_type: trx.trx_type,
        sender_pubkey: &trx.sender_pubkey,
        data: &trx.data,
        timestamp: trx.timestamp,
    };
    Ok(blake2b_256(&to_cbor(&header)?))
}

/// Ed25519 signing key
#[derive(Clone)]
pub struct SigningKey {
    keypair: [u8; 64],
    public: PublicKey,
}

impl SigningKey {
    /// Derive a key pair from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let (keypair, public) = ed25519::keypair(seed);
        Self {
            keypair,
            public: PublicKey::new(public),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        ed25519::signature(message, &self.keypair).to_vec()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("public", &self.public).finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature; malformed signatures simply fail
pub fn verify_signature(key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    match <&[u8; 64]>::try_from(signature) {
        Ok(signature) => ed25519::verify(message, key, signature),
        Err(_) => false,
    }
}
