//! Core type definitions for Quorum group chains

use crate::declare_hash_type;
use serde::{Deserialize, Serialize};

declare_hash_type!(
    /// Content digest identifying a block within a group.
    BlockId,
    32
);
declare_hash_type!(
    /// Globally unique (per group) transaction identifier.
    TrxId,
    32
);
declare_hash_type!(
    /// Ed25519 verification key of a producer or user.
    PublicKey,
    32
);

/// Identity of a consensus participant (the hex of its signing key in
/// production deployments).
pub type NodeId = String;

/// Transaction type
///
/// Only the state-changing types (`Post` to `Schema`) are dispatched when a
/// block is applied; the sync and control types travel in blocks but are
/// skipped by the application pass.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[cbor(index_only)]
pub enum TrxType {
    #[n(0)]
    Post,
    #[n(1)]
    Auth,
    #[n(2)]
    Producer,
    #[n(3)]
    Announce,
    #[n(4)]
    Schema,
    #[n(5)]
    ReqBlockForward,
    #[n(6)]
    ReqBlockBackward,
    #[n(7)]
    ReqBlockResp,
    #[n(8)]
    BlockProduced,
    #[n(9)]
    AskPeerId,
}

/// A group transaction
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Trx {
    #[n(0)]
    pub trx_id: TrxId,

    #[n(1)]
    pub group_id: String,

    #[n(2)]
    pub trx_type: TrxType,

    /// Signing key of the originating user
    #[n(3)]
    pub sender_pubkey: PublicKey,

    /// Payload, encrypted for the group
    #[n(4)]
    pub data: Vec<u8>,

    /// Unix nanoseconds at creation
    #[n(5)]
    pub timestamp: i64,

    /// Number of times this trx has been put back into consensus after its
    /// block was abandoned
    #[n(6)]
    pub resend_count: u32,

    #[n(7)]
    pub sender_sign: Vec<u8>,
}

/// A block of transactions produced for one group
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Block {
    #[n(0)]
    pub block_id: BlockId,

    #[n(1)]
    pub group_id: String,

    /// Zero for the genesis block
    #[n(2)]
    pub prev_block_id: BlockId,

    /// Height marker as reported by the producer
    #[n(3)]
    pub epoch: u64,

    #[n(4)]
    pub timestamp: i64,

    #[n(5)]
    pub trxs: Vec<Trx>,

    #[n(6)]
    pub producer_pubkey: PublicKey,

    /// Producer's Ed25519 signature over `block_id`
    #[n(7)]
    pub signature: Vec<u8>,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.prev_block_id.is_zero()
    }
}

/// The bundle a participant feeds into one epoch's agreement
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct TrxBundle {
    #[n(0)]
    pub trxs: Vec<Trx>,
}

/// Group encryption mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptType {
    /// Payloads are encrypted with the shared group cipher key
    #[default]
    Public,

    /// Posts are encrypted for each announced user
    Private,
}

/// Height and id of the canonical chain tip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub height: u64,
    pub block_id: BlockId,
}

/// Per-group mutable chain record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupChainState {
    pub group_id: String,

    /// Key of the group owner, always an eligible producer
    pub owner_pubkey: PublicKey,

    /// This node's signing key; identifies locally originated trxs
    pub user_sign_pubkey: PublicKey,

    /// This node's encryption key for private-group posts
    pub user_encrypt_pubkey: String,

    pub encrypt_type: EncryptType,

    /// Shared AES key for public-group payloads
    pub cipher_key: Vec<u8>,

    pub highest_height: u64,
    pub highest_block_id: BlockId,

    /// Keys allowed to produce blocks
    pub producers: Vec<PublicKey>,
}

impl GroupChainState {
    pub fn tip(&self) -> ChainTip {
        ChainTip {
            height: self.highest_height,
            block_id: self.highest_block_id,
        }
    }

    pub fn is_producer(&self, key: &PublicKey) -> bool {
        *key == self.owner_pubkey || self.producers.contains(key)
    }
}

/// Add/remove action carried by list-update items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemAction {
    Add,
    Remove,
}

/// Payload of a PRODUCER trx
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerItem {
    pub producer_pubkey: PublicKey,
    pub action: ItemAction,
}

/// Payload of an AUTH trx
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyUserItem {
    pub user_pubkey: PublicKey,
    pub action: ItemAction,
}

/// Payload of an ANNOUNCE trx
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceItem {
    pub sign_pubkey: PublicKey,
    pub encrypt_pubkey: String,
    pub action: ItemAction,
}

/// Payload of a SCHEMA trx
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaItem {
    pub schema_type: String,
    pub rule: String,
    pub action: ItemAction,
}
