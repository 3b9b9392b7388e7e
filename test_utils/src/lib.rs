//! Builders and fakes shared by the Quorum module tests

use std::sync::Mutex;

use anyhow::{bail, Result};
use quorum_common::cipher::{aes_encrypt, NONCE_LEN};
use quorum_common::crypto::{block_digest, trx_digest, SigningKey};
use quorum_common::{Block, BlockId, PublicKey, Trx, TrxId, TrxSender, TrxType};
use serde::Serialize;

pub const GROUP_ID: &str = "test-group";

/// Shared symmetric key used by every test group
pub const CIPHER_KEY: [u8; 32] = [0x42; 32];

/// Deterministic trx id: `n` in every byte
pub fn trx_id(n: u8) -> TrxId {
    TrxId::new([n; 32])
}

/// A key holder that signs blocks for a group
pub struct TestProducer {
    key: SigningKey,
}

impl TestProducer {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_seed(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Epoch 0 block with no parent
    pub fn genesis(&self) -> Block {
        self.seal(Block {
            block_id: BlockId::default(),
            group_id: GROUP_ID.to_string(),
            prev_block_id: BlockId::default(),
            epoch: 0,
            timestamp: 1_000,
            trxs: vec![],
            producer_pubkey: self.public_key(),
            signature: vec![],
        })
    }

    /// Valid child of `parent`
    pub fn block(&self, parent: &Block, trxs: Vec<Trx>) -> Block {
        self.block_with(parent, trxs, |_| {})
    }

    /// Child of `parent`, with `tweak` applied before the block is sealed
    pub fn block_with(&self, parent: &Block, trxs: Vec<Trx>, tweak: impl FnOnce(&mut Block)) -> Block {
        let mut block = Block {
            block_id: BlockId::default(),
            group_id: parent.group_id.clone(),
            prev_block_id: parent.block_id,
            epoch: parent.epoch.wrapping_add(1),
            timestamp: parent.timestamp + 1,
            trxs,
            producer_pubkey: self.public_key(),
            signature: vec![],
        };
        tweak(&mut block);
        self.seal(block)
    }

    /// Recompute the id and signature
    pub fn seal(&self, mut block: Block) -> Block {
        block.block_id = block_digest(&block).unwrap();
        block.signature = self.key.sign(block.block_id.as_ref());
        block
    }
}

/// A group member that creates signed, encrypted trxs
pub struct TestUser {
    key: SigningKey,
}

impl TestUser {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_seed(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Trx `n` carrying `payload` encrypted with [`CIPHER_KEY`]
    pub fn trx(&self, n: u8, trx_type: TrxType, payload: &[u8]) -> Trx {
        let data = aes_encrypt(&CIPHER_KEY, [n; NONCE_LEN], payload).unwrap();
        self.trx_with_data(n, trx_type, data)
    }

    /// Trx `n` carrying raw `data` with no encryption applied
    pub fn trx_with_data(&self, n: u8, trx_type: TrxType, data: Vec<u8>) -> Trx {
        let mut trx = Trx {
            trx_id: trx_id(n),
            group_id: GROUP_ID.to_string(),
            trx_type,
            sender_pubkey: self.public_key(),
            data,
            timestamp: 2_000 + n as i64,
            resend_count: 0,
            sender_sign: vec![],
        };
        trx.sender_sign = self.key.sign(&trx_digest(&trx).unwrap());
        trx
    }

    /// POST trx with a plain text body
    pub fn post(&self, n: u8) -> Trx {
        self.trx(n, TrxType::Post, format!("post #{n}").as_bytes())
    }

    /// Trx whose payload is `item` as JSON
    pub fn item_trx<T: Serialize>(&self, n: u8, trx_type: TrxType, item: &T) -> Trx {
        self.trx(n, trx_type, &serde_json::to_vec(item).unwrap())
    }
}

/// Bare trx with id `n`, for tests that never decrypt it
pub fn plain_trx(n: u8) -> Trx {
    Trx {
        trx_id: trx_id(n),
        group_id: GROUP_ID.to_string(),
        trx_type: TrxType::Post,
        sender_pubkey: PublicKey::default(),
        data: vec![n],
        timestamp: n as i64,
        resend_count: 0,
        sender_sign: vec![],
    }
}

/// [`TrxSender`] that remembers everything it was given
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<Trx>>,
    pub resent: Mutex<Vec<Trx>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Trx> {
        self.sent.lock().unwrap().clone()
    }

    pub fn resent(&self) -> Vec<Trx> {
        self.resent.lock().unwrap().clone()
    }
}

impl TrxSender for RecordingSender {
    fn send_trx(&self, trx: Trx) -> Result<()> {
        if self.fail {
            bail!("sender unavailable");
        }
        self.sent.lock().unwrap().push(trx);
        Ok(())
    }

    fn resend_trxs(&self, trxs: Vec<Trx>) -> Result<()> {
        if self.fail {
            bail!("sender unavailable");
        }
        self.resent.lock().unwrap().extend(trxs);
        Ok(())
    }
}
