//! In-memory chain store using DashMap

use anyhow::{Context, Result};
use dashmap::{DashMap, DashSet};
use quorum_common::{
    AnnounceItem, Block, BlockId, DenyUserItem, ItemAction, ProducerItem, PublicKey, SchemaItem,
    Trx, TrxId,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{BlockLocation, ChainStore};

#[derive(Default)]
pub struct MemoryChainStore {
    cache: DashMap<BlockId, Block>,
    chain: DashMap<BlockId, Block>,
    trxs: DashMap<TrxId, Trx>,

    /// Decrypted post bodies
    posts: DashMap<TrxId, Vec<u8>>,
    denied: DashSet<PublicKey>,
    producers: DashSet<PublicKey>,
    /// Sign key to encryption key
    announced: DashMap<PublicKey, String>,
    /// Schema type to rule
    schemas: DashMap<String, String>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        info!("Storing group chain in memory (DashMap)");
        Self::default()
    }

    fn tier(&self, location: BlockLocation) -> &DashMap<BlockId, Block> {
        match location {
            BlockLocation::Cache => &self.cache,
            BlockLocation::Chain => &self.chain,
        }
    }

    pub fn block_count(&self, location: BlockLocation) -> usize {
        self.tier(location).len()
    }

    pub fn post(&self, id: &TrxId) -> Option<Vec<u8>> {
        self.posts.get(id).map(|body| body.clone())
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub fn trx(&self, id: &TrxId) -> Option<Trx> {
        self.trxs.get(id).map(|trx| trx.clone())
    }

    pub fn is_denied(&self, key: &PublicKey) -> bool {
        self.denied.contains(key)
    }

    pub fn announced_key(&self, key: &PublicKey) -> Option<String> {
        self.announced.get(key).map(|k| k.clone())
    }

    pub fn schema_rule(&self, schema_type: &str) -> Option<String> {
        self.schemas.get(schema_type).map(|r| r.clone())
    }
}

fn parse_item<T: DeserializeOwned>(trx: &Trx, plaintext: &[u8]) -> Result<T> {
    serde_json::from_slice(plaintext)
        .with_context(|| format!("bad {:?} payload in trx {}", trx.trx_type, trx.trx_id))
}

impl ChainStore for MemoryChainStore {
    fn block_exists(&self, id: &BlockId, location: BlockLocation) -> Result<bool> {
        Ok(self.tier(location).contains_key(id))
    }

    fn get_block(&self, id: &BlockId, location: BlockLocation) -> Result<Option<Block>> {
        Ok(self.tier(location).get(id).map(|block| block.clone()))
    }

    fn put_block(&self, block: &Block, location: BlockLocation) -> Result<()> {
        self.tier(location).insert(block.block_id, block.clone());
        Ok(())
    }

    fn remove_block(&self, id: &BlockId, location: BlockLocation) -> Result<()> {
        self.tier(location).remove(id);
        Ok(())
    }

    fn get_children(&self, id: &BlockId, location: BlockLocation) -> Result<Vec<Block>> {
        let mut children: Vec<Block> = self
            .tier(location)
            .iter()
            .filter(|entry| entry.value().prev_block_id == *id)
            .map(|entry| entry.value().clone())
            .collect();
        children.sort_by_key(|block| block.block_id);
        Ok(children)
    }

    fn trx_exists(&self, id: &TrxId) -> Result<bool> {
        Ok(self.trxs.contains_key(id))
    }

    fn put_trx(&self, trx: &Trx) -> Result<()> {
        self.trxs.insert(trx.trx_id, trx.clone());
        Ok(())
    }

    fn apply_post(&self, trx: &Trx, plaintext: &[u8]) -> Result<()> {
        self.posts.insert(trx.trx_id, plaintext.to_vec());
        Ok(())
    }

    fn apply_permission_update(&self, trx: &Trx, plaintext: &[u8]) -> Result<()> {
        let item: DenyUserItem = parse_item(trx, plaintext)?;
        debug!(user = %item.user_pubkey, action = ?item.action, "deny list update");
        match item.action {
            ItemAction::Add => {
                self.denied.insert(item.user_pubkey);
            }
            ItemAction::Remove => {
                self.denied.remove(&item.user_pubkey);
            }
        }
        Ok(())
    }

    fn apply_producer_update(&self, trx: &Trx, plaintext: &[u8]) -> Result<()> {
        let item: ProducerItem = parse_item(trx, plaintext)?;
        debug!(producer = %item.producer_pubkey, action = ?item.action, "producer update");
        match item.action {
            ItemAction::Add => {
                self.producers.insert(item.producer_pubkey);
            }
            ItemAction::Remove => {
                self.producers.remove(&item.producer_pubkey);
            }
        }
        Ok(())
    }

    fn apply_announcement(&self, trx: &Trx, plaintext: &[u8]) -> Result<()> {
        let item: AnnounceItem = parse_item(trx, plaintext)?;
        match item.action {
            ItemAction::Add => {
                self.announced.insert(item.sign_pubkey, item.encrypt_pubkey);
            }
            ItemAction::Remove => {
                self.announced.remove(&item.sign_pubkey);
            }
        }
        Ok(())
    }

    fn apply_schema_update(&self, trx: &Trx, plaintext: &[u8]) -> Result<()> {
        let item: SchemaItem = parse_item(trx, plaintext)?;
        match item.action {
            ItemAction::Add => {
                self.schemas.insert(item.schema_type, item.rule);
            }
            ItemAction::Remove => {
                self.schemas.remove(&item.schema_type);
            }
        }
        Ok(())
    }

    fn producers(&self) -> Result<Vec<PublicKey>> {
        let mut producers: Vec<PublicKey> = self.producers.iter().map(|key| *key).collect();
        producers.sort();
        Ok(producers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_common::TrxType;
    use quorum_test_utils::{plain_trx, TestProducer};

    #[test]
    fn gather_connected_is_parent_first() {
        let store = MemoryChainStore::new();
        let producer = TestProducer::new(1);
        let genesis = producer.genesis();
        let a = producer.block(&genesis, vec![]);
        let b = producer.block(&a, vec![]);
        let c = producer.block(&b, vec![]);
        let a2 = producer.block(&genesis, vec![plain_trx(1)]);
        for block in [&c, &b, &a2] {
            store.put_block(block, BlockLocation::Cache).unwrap();
        }

        let gathered = store.gather_connected(&a, BlockLocation::Cache).unwrap();
        let ids: Vec<BlockId> = gathered.iter().map(|b| b.block_id).collect();
        assert_eq!(ids, vec![a.block_id, b.block_id, c.block_id]);
    }

    #[test]
    fn tiers_are_separate() {
        let store = MemoryChainStore::new();
        let genesis = TestProducer::new(1).genesis();
        store.put_block(&genesis, BlockLocation::Cache).unwrap();
        assert!(store.block_exists(&genesis.block_id, BlockLocation::Cache).unwrap());
        assert!(!store.block_exists(&genesis.block_id, BlockLocation::Chain).unwrap());
        store.remove_block(&genesis.block_id, BlockLocation::Cache).unwrap();
        assert_eq!(store.block_count(BlockLocation::Cache), 0);
    }

    #[test]
    fn producer_items_add_and_remove() {
        let store = MemoryChainStore::new();
        let mut trx = plain_trx(1);
        trx.trx_type = TrxType::Producer;
        let key = PublicKey::new([3; 32]);
        let add = serde_json::to_vec(&ProducerItem {
            producer_pubkey: key,
            action: ItemAction::Add,
        })
        .unwrap();
        store.apply_producer_update(&trx, &add).unwrap();
        assert_eq!(store.producers().unwrap(), vec![key]);

        let remove = serde_json::to_vec(&ProducerItem {
            producer_pubkey: key,
            action: ItemAction::Remove,
        })
        .unwrap();
        store.apply_producer_update(&trx, &remove).unwrap();
        assert!(store.producers().unwrap().is_empty());
    }

    #[test]
    fn malformed_item_is_an_error() {
        let store = MemoryChainStore::new();
        let trx = plain_trx(1);
        assert!(store.apply_schema_update(&trx, b"not json").is_err());
    }
}
