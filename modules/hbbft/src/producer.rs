//! Hand-off of agreed trxs to block production

use anyhow::{anyhow, Result};
use quorum_common::{ChainTip, Trx};
use tokio::sync::mpsc;

/// Ordered trxs agreed in one epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreedBatch {
    pub group_id: String,
    pub epoch: u64,
    /// Chain tip when agreement completed; the new block's parent
    pub parent: ChainTip,
    pub trxs: Vec<Trx>,
}

/// Builds a block from each agreed batch
pub trait BlockProducer: Send + Sync {
    fn on_agreed_batch(&self, batch: AgreedBatch) -> Result<()>;
}

/// Forwards batches to a block production task
#[derive(Debug, Clone)]
pub struct ChannelBlockProducer {
    tx: mpsc::UnboundedSender<AgreedBatch>,
}

impl ChannelBlockProducer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgreedBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BlockProducer for ChannelBlockProducer {
    fn on_agreed_batch(&self, batch: AgreedBatch) -> Result<()> {
        self.tx.send(batch).map_err(|_| anyhow!("block production channel closed"))
    }
}
