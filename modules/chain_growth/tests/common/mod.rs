#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use quorum_common::{Block, BlockId, GroupChainState, PublicKey};
use quorum_module_chain_growth::{
    ChainGrowthConfig, ChainGrowthEngine, ChainObserver, GroupCipher, MemoryChainStore,
};
use quorum_test_utils::{RecordingSender, TestProducer, TestUser, CIPHER_KEY, GROUP_ID};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct RecordingObserver {
    pub heights: Mutex<Vec<(u64, BlockId)>>,
    pub producers: Mutex<Vec<Vec<PublicKey>>>,
}

impl RecordingObserver {
    pub fn heights(&self) -> Vec<(u64, BlockId)> {
        self.heights.lock().unwrap().clone()
    }

    pub fn producer_updates(&self) -> Vec<Vec<PublicKey>> {
        self.producers.lock().unwrap().clone()
    }
}

impl ChainObserver for RecordingObserver {
    fn height_changed(&self, height: u64, tip: BlockId) {
        self.heights.lock().unwrap().push((height, tip));
    }

    fn producers_changed(&self, producers: &[PublicKey]) {
        self.producers.lock().unwrap().push(producers.to_vec());
    }
}

/// One group with a committed genesis, owned by `owner`. `me` is the local
/// user; `other` is some other group member.
pub struct Harness {
    pub owner: TestProducer,
    pub me: TestUser,
    pub other: TestUser,
    pub genesis: Block,
    pub store: Arc<MemoryChainStore>,
    pub sender: Arc<RecordingSender>,
    pub observer: Arc<RecordingObserver>,
    pub engine: ChainGrowthEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ChainGrowthConfig::for_group(GROUP_ID))
    }

    pub fn with_config(config: ChainGrowthConfig) -> Self {
        init_tracing();
        let owner = TestProducer::new(1);
        let me = TestUser::new(10);
        let other = TestUser::new(11);
        let store = Arc::new(MemoryChainStore::new());
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());

        let state = GroupChainState {
            group_id: GROUP_ID.to_string(),
            owner_pubkey: owner.public_key(),
            user_sign_pubkey: me.public_key(),
            cipher_key: CIPHER_KEY.to_vec(),
            ..Default::default()
        };
        let mut engine = ChainGrowthEngine::new(
            config,
            state,
            store.clone(),
            Arc::new(GroupCipher::without_keystore()),
            sender.clone(),
            observer.clone(),
        );
        let genesis = owner.genesis();
        engine.commit_genesis(genesis.clone()).unwrap();

        Self {
            owner,
            me,
            other,
            genesis,
            store,
            sender,
            observer,
            engine,
        }
    }
}
