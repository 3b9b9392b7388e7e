#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use quorum_common::{ChainInfo, ChainTip, NodeId};
use quorum_module_hbbft::{
    AcsFactory, AcsInstance, AcsStep, AgreedBatch, BlockProducer, HbConfig, HoneyBadger,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(node: &str, nodes: &[&str], batch_size: usize, seed: u64) -> HbConfig {
    HbConfig {
        group_id: "test-group".to_string(),
        node_id: node.to_string(),
        nodes: nodes.iter().map(|n| n.to_string()).collect(),
        batch_size,
        rng_seed: Some(seed),
        faulty: None,
    }
}

#[derive(Default)]
pub struct RecordingProducer {
    batches: Mutex<Vec<AgreedBatch>>,
}

impl RecordingProducer {
    pub fn batches(&self) -> Vec<AgreedBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl BlockProducer for RecordingProducer {
    fn on_agreed_batch(&self, batch: AgreedBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }
}

pub struct FixedTip(pub ChainTip);

impl ChainInfo for FixedTip {
    fn chain_tip(&self) -> ChainTip {
        self.0
    }
}

/// Instance whose inputs are recorded and whose decision is delivered by
/// the test through `on_agreement_complete`
pub struct ScriptedFactory {
    pub inputs: Arc<Mutex<Vec<(u64, Vec<u8>)>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inputs_for(&self, epoch: u64) -> Vec<Vec<u8>> {
        self.inputs
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == epoch)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

struct ScriptedAcs {
    epoch: u64,
    inputs: Arc<Mutex<Vec<(u64, Vec<u8>)>>>,
}

impl AcsInstance for ScriptedAcs {
    fn input_value(&mut self, value: Vec<u8>) -> Result<AcsStep> {
        self.inputs.lock().unwrap().push((self.epoch, value));
        Ok(AcsStep::Pending)
    }

    fn handle_message(&mut self, _sender: &NodeId, _payload: &[u8]) -> Result<AcsStep> {
        Ok(AcsStep::Pending)
    }
}

impl AcsFactory for ScriptedFactory {
    fn create(&self, epoch: u64) -> Result<Box<dyn AcsInstance>> {
        Ok(Box::new(ScriptedAcs {
            epoch,
            inputs: self.inputs.clone(),
        }))
    }
}

/// Message in flight: (from, to, epoch, payload)
type Envelope = (NodeId, NodeId, u64, Vec<u8>);

/// All-to-all FIFO network. Every broadcast is queued for every node in the
/// same order, so all receivers see proposals in the same sequence.
pub struct Network {
    nodes: Vec<NodeId>,
    queue: Mutex<VecDeque<Envelope>>,
}

impl Network {
    pub fn new(nodes: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            queue: Mutex::new(VecDeque::new()),
        })
    }

    pub fn broadcast(&self, from: &NodeId, epoch: u64, payload: Vec<u8>) {
        let mut queue = self.queue.lock().unwrap();
        for to in &self.nodes {
            queue.push_back((from.clone(), to.clone(), epoch, payload.clone()));
        }
    }

    fn pop(&self) -> Option<Envelope> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Deliver until quiet; messages to nodes not in `running` are dropped
    pub fn run(&self, running: &BTreeMap<NodeId, Arc<HoneyBadger>>) {
        while let Some((from, to, epoch, payload)) = self.pop() {
            if let Some(hb) = running.get(&to) {
                hb.handle_message(&from, epoch, &payload).unwrap();
            }
        }
    }
}

/// Simplified common subset: each participant broadcasts its proposal and
/// decides on the first `N - f` proposals it receives.
pub struct BroadcastAcs {
    me: NodeId,
    epoch: u64,
    threshold: usize,
    net: Arc<Network>,
    proposals: BTreeMap<NodeId, Vec<u8>>,
    decided: bool,
}

impl AcsInstance for BroadcastAcs {
    fn input_value(&mut self, value: Vec<u8>) -> Result<AcsStep> {
        self.net.broadcast(&self.me, self.epoch, value);
        Ok(AcsStep::Pending)
    }

    fn handle_message(&mut self, sender: &NodeId, payload: &[u8]) -> Result<AcsStep> {
        if self.decided {
            return Ok(AcsStep::Pending);
        }
        self.proposals.entry(sender.clone()).or_insert_with(|| payload.to_vec());
        if self.proposals.len() < self.threshold {
            return Ok(AcsStep::Pending);
        }
        self.decided = true;
        Ok(AcsStep::Decided(self.proposals.clone()))
    }
}

pub struct BroadcastAcsFactory {
    pub me: NodeId,
    pub threshold: usize,
    pub net: Arc<Network>,
}

impl AcsFactory for BroadcastAcsFactory {
    fn create(&self, epoch: u64) -> Result<Box<dyn AcsInstance>> {
        Ok(Box::new(BroadcastAcs {
            me: self.me.clone(),
            epoch,
            threshold: self.threshold,
            net: self.net.clone(),
            proposals: BTreeMap::new(),
            decided: false,
        }))
    }
}
