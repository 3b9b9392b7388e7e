//! Quorum HoneyBadger module
//! Batches a group's pending trxs into epochs, runs one agreement instance
//! per epoch and hands each agreed, deduplicated trx set to block
//! production.

pub mod acs;
pub mod configuration;
pub mod error;
pub mod producer;
pub mod trx_buffer;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use quorum_common::codec::{decode_bundle, encode_bundle};
use quorum_common::{ChainInfo, NodeId, Trx, TrxSender};
use tracing::{debug, error, info, info_span, warn};

pub use acs::{AcsFactory, AcsInstance, AcsStep};
pub use configuration::HbConfig;
pub use error::{BufferError, HbError};
pub use producer::{AgreedBatch, BlockProducer, ChannelBlockProducer};
pub use trx_buffer::TrxBuffer;

struct Slot {
    acs: Box<dyn AcsInstance>,
    proposed: bool,
}

/// Live instances and epoch bookkeeping, under one lock
struct Epochs {
    instances: HashMap<u64, Arc<Mutex<Slot>>>,
    /// Epoch this node proposes into
    current: u64,
    /// Lowest epoch still accepted; everything below is retired
    floor: u64,
    /// Epoch whose instance failed, until an operator resumes
    halted: Option<u64>,
}

impl Epochs {
    fn retire_below(&mut self, epoch: u64) {
        self.floor = self.floor.max(epoch);
        self.current = self.current.max(epoch);
        let floor = self.floor;
        self.instances.retain(|e, _| *e >= floor);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// HoneyBadger epoch coordinator for one group
///
/// All methods take `&self`; share it behind an `Arc` between the network
/// handler and the trx ingress.
pub struct HoneyBadger {
    config: HbConfig,
    buffer: TrxBuffer,
    epochs: Mutex<Epochs>,
    acs_factory: Arc<dyn AcsFactory>,
    producer: Arc<dyn BlockProducer>,
    chain: Arc<dyn ChainInfo>,
}

impl HoneyBadger {
    pub fn new(
        config: HbConfig,
        acs_factory: Arc<dyn AcsFactory>,
        producer: Arc<dyn BlockProducer>,
        chain: Arc<dyn ChainInfo>,
    ) -> Self {
        let buffer = match config.rng_seed {
            Some(seed) => TrxBuffer::with_seed(seed),
            None => TrxBuffer::new(),
        };
        info!(
            group = %config.group_id,
            node = %config.node_id,
            nodes = config.nodes.len(),
            batch_size = config.batch_size,
            "HoneyBadger coordinator started"
        );
        Self {
            config,
            buffer,
            epochs: Mutex::new(Epochs {
                instances: HashMap::new(),
                current: 0,
                floor: 0,
                halted: None,
            }),
            acs_factory,
            producer,
            chain,
        }
    }

    /// Epoch this node proposes into next
    pub fn epoch(&self) -> u64 {
        lock(&self.epochs).current
    }

    pub fn is_halted(&self) -> bool {
        lock(&self.epochs).halted.is_some()
    }

    pub fn buffer(&self) -> &TrxBuffer {
        &self.buffer
    }

    /// Number of epochs with a live instance
    pub fn live_instances(&self) -> usize {
        lock(&self.epochs).instances.len()
    }

    /// Buffer a trx and propose if it is the only one pending.
    ///
    /// A trx seen before is ignored. While halted, a trx that would start a
    /// proposal stays buffered and [`HbError::Halted`] is returned.
    pub fn submit(&self, trx: Trx) -> Result<(), HbError> {
        match self.buffer.push(trx) {
            Ok(1) => self.propose(),
            Ok(len) => {
                debug!(pending = len, "trx buffered");
                Ok(())
            }
            Err(BufferError::Duplicate(id)) => {
                debug!(trx = %id, "trx already buffered");
                Ok(())
            }
        }
    }

    fn obtain(&self, epochs: &mut Epochs, epoch: u64) -> Result<Arc<Mutex<Slot>>, HbError> {
        if let Some(slot) = epochs.instances.get(&epoch) {
            return Ok(slot.clone());
        }
        match self.acs_factory.create(epoch) {
            Ok(acs) => {
                debug!(epoch, "agreement instance created");
                let slot = Arc::new(Mutex::new(Slot {
                    acs,
                    proposed: false,
                }));
                epochs.instances.insert(epoch, slot.clone());
                Ok(slot)
            }
            Err(source) => {
                error!(epoch, error = %source, "could not create agreement instance, halting");
                epochs.halted = Some(epoch);
                Err(HbError::Agreement { epoch, source })
            }
        }
    }

    /// Feed a random sample of pending trxs into the current epoch
    pub fn propose(&self) -> Result<(), HbError> {
        let (epoch, slot) = {
            let mut epochs = lock(&self.epochs);
            if let Some(failed) = epochs.halted {
                return Err(HbError::Halted { epoch: failed });
            }
            let epoch = epochs.current;
            (epoch, self.obtain(&mut epochs, epoch)?)
        };

        let step = {
            let mut slot = lock(&*slot);
            if slot.proposed {
                debug!(epoch, "already proposed in this epoch");
                return Ok(());
            }
            let trxs = self.buffer.sample_random(self.config.batch_size);
            if trxs.is_empty() {
                return Ok(());
            }
            info!(epoch, count = trxs.len(), "proposing trxs");
            let bundle = encode_bundle(trxs)?;
            slot.proposed = true;
            slot.acs.input_value(bundle)
        };
        self.drive(epoch, step)
    }

    /// Route an inbound consensus message to its epoch's instance.
    ///
    /// Messages for retired epochs are dropped.
    pub fn handle_message(&self, sender: &NodeId, epoch: u64, payload: &[u8]) -> Result<(), HbError> {
        let slot = {
            let mut epochs = lock(&self.epochs);
            if epoch < epochs.floor {
                debug!(epoch, %sender, floor = epochs.floor, "stale message dropped");
                return Ok(());
            }
            if let Some(failed) = epochs.halted {
                return Err(HbError::Halted { epoch: failed });
            }
            self.obtain(&mut epochs, epoch)?
        };

        let step = lock(&*slot).acs.handle_message(sender, payload);
        self.drive(epoch, step)
    }

    fn drive(&self, epoch: u64, step: Result<AcsStep>) -> Result<(), HbError> {
        match step {
            Ok(AcsStep::Pending) => Ok(()),
            Ok(AcsStep::Decided(results)) => self.on_agreement_complete(epoch, results),
            Err(source) => {
                error!(epoch, error = %source, "agreement instance failed, halting");
                lock(&self.epochs).halted = Some(epoch);
                Err(HbError::Agreement { epoch, source })
            }
        }
    }

    /// Deliver the agreed proposals of `epoch`, keyed by proposer.
    ///
    /// Bundles are merged in proposer order, first occurrence of a trx id
    /// winning. A second completion of the same epoch is ignored. Block
    /// production runs with no lock held, so it may call back into the
    /// coordinator. If it rejects the batch, the agreed trxs go back into
    /// the buffer for the next epoch and the error is returned.
    pub fn on_agreement_complete(
        &self,
        epoch: u64,
        results: BTreeMap<NodeId, Vec<u8>>,
    ) -> Result<(), HbError> {
        let span = info_span!("hbbft.agreed", epoch);
        let _entered = span.enter();

        let batch = {
            let mut epochs = lock(&self.epochs);
            if epoch < epochs.floor {
                debug!(floor = epochs.floor, "epoch already retired");
                return Ok(());
            }

            let mut seen = HashSet::new();
            let mut trxs = Vec::new();
            for (proposer, bundle) in &results {
                match decode_bundle(bundle) {
                    Ok(bundle) => {
                        trxs.extend(bundle.into_iter().filter(|t| seen.insert(t.trx_id)));
                    }
                    Err(e) => {
                        warn!(%proposer, error = %e, "undecodable proposal skipped");
                    }
                }
            }
            for trx in &trxs {
                self.buffer.delete(&trx.trx_id);
            }
            epochs.retire_below(epoch.saturating_add(1));

            AgreedBatch {
                group_id: self.config.group_id.clone(),
                epoch,
                parent: self.chain.chain_tip(),
                trxs,
            }
        };
        info!(
            proposers = results.len(),
            trxs = batch.trxs.len(),
            "agreement complete"
        );

        let agreed = batch.trxs.clone();
        if let Err(source) = self.producer.on_agreed_batch(batch) {
            warn!(error = %source, "block production rejected the batch, trxs buffered again");
            for trx in agreed {
                let _ = self.buffer.push(trx);
            }
            if !self.is_halted() {
                self.propose()?;
            }
            return Err(HbError::Production { epoch, source });
        }

        if !self.is_halted() && !self.buffer.is_empty() {
            self.propose()
        } else {
            Ok(())
        }
    }

    /// Clear a halt: the failed epoch is abandoned and proposing continues
    /// in the next one.
    pub fn resume(&self) -> Result<(), HbError> {
        let propose_again = {
            let mut epochs = lock(&self.epochs);
            let Some(failed) = epochs.halted.take() else {
                return Ok(());
            };
            epochs.retire_below(failed.saturating_add(1));
            info!(failed, epoch = epochs.current, "consensus resumed");
            !self.buffer.is_empty()
        };

        if propose_again {
            self.propose()
        } else {
            Ok(())
        }
    }
}

/// Standalone deployment: this node's trxs go straight into its own
/// coordinator.
impl TrxSender for HoneyBadger {
    fn send_trx(&self, trx: Trx) -> Result<()> {
        Ok(self.submit(trx)?)
    }

    fn resend_trxs(&self, trxs: Vec<Trx>) -> Result<()> {
        for trx in trxs {
            self.submit(trx)?;
        }
        Ok(())
    }
}
