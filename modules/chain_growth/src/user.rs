//! Group user facade: builds signed, encrypted trxs and submits them

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use quorum_common::cipher::aes_encrypt;
use quorum_common::crypto::{trx_digest, SigningKey};
use quorum_common::{
    AnnounceItem, DenyUserItem, EncryptType, ProducerItem, SchemaItem, Trx, TrxId, TrxSender,
    TrxType,
};
use serde::Serialize;
use tracing::debug;

use crate::chain_engine::ChainStateHandle;
use crate::decrypt::Keystore;

/// Creates this node's trxs for one group
pub struct GroupUser {
    group_id: String,
    key: SigningKey,
    state: ChainStateHandle,
    sender: Arc<dyn TrxSender>,
    keystore: Option<Arc<dyn Keystore>>,
}

impl GroupUser {
    pub fn new(
        group_id: &str,
        key: SigningKey,
        state: ChainStateHandle,
        sender: Arc<dyn TrxSender>,
        keystore: Option<Arc<dyn Keystore>>,
    ) -> Self {
        Self {
            group_id: group_id.to_string(),
            key,
            state,
            sender,
            keystore,
        }
    }

    /// Post content to the group
    pub fn post_to_group(&self, content: &[u8]) -> Result<TrxId> {
        self.submit(TrxType::Post, content.to_vec())
    }

    pub fn upd_announce(&self, item: &AnnounceItem) -> Result<TrxId> {
        self.submit_item(TrxType::Announce, item)
    }

    pub fn upd_deny_list(&self, item: &DenyUserItem) -> Result<TrxId> {
        self.submit_item(TrxType::Auth, item)
    }

    pub fn upd_schema(&self, item: &SchemaItem) -> Result<TrxId> {
        self.submit_item(TrxType::Schema, item)
    }

    pub fn upd_producer(&self, item: &ProducerItem) -> Result<TrxId> {
        self.submit_item(TrxType::Producer, item)
    }

    fn submit_item<T: Serialize>(&self, trx_type: TrxType, item: &T) -> Result<TrxId> {
        let payload = serde_json::to_vec(item).context("could not encode item")?;
        self.submit(trx_type, payload)
    }

    fn submit(&self, trx_type: TrxType, payload: Vec<u8>) -> Result<TrxId> {
        let trx = self.build_trx(trx_type, &payload)?;
        let id = trx.trx_id;
        debug!(trx = %id, ?trx_type, "submitting trx");
        self.sender.send_trx(trx)?;
        Ok(id)
    }

    fn encrypt(&self, trx_type: TrxType, payload: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.snapshot();
        if trx_type == TrxType::Post && state.encrypt_type == EncryptType::Private {
            let Some(keystore) = &self.keystore else {
                bail!("private group {} needs a keystore", self.group_id);
            };
            return keystore.encrypt(&state.user_encrypt_pubkey, payload);
        }
        Ok(aes_encrypt(&state.cipher_key, rand::random(), payload)?)
    }

    fn build_trx(&self, trx_type: TrxType, payload: &[u8]) -> Result<Trx> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        let mut trx = Trx {
            trx_id: TrxId::new(rand::random()),
            group_id: self.group_id.clone(),
            trx_type,
            sender_pubkey: self.key.public_key(),
            data: self.encrypt(trx_type, payload)?,
            timestamp,
            resend_count: 0,
            sender_sign: vec![],
        };
        trx.sender_sign = self.key.sign(&trx_digest(&trx)?);
        Ok(trx)
    }
}
