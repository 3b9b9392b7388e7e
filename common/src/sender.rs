//! Capability traits shared by the chain layer and the consensus layer

use crate::types::{ChainTip, Trx};
use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// Who puts trxs into consensus on this node's behalf
///
/// A standalone node submits straight into its own coordinator; a node that
/// is not a producer hands them to a task that forwards them to one.
pub trait TrxSender: Send + Sync {
    /// Submit a newly created trx
    fn send_trx(&self, trx: Trx) -> Result<()>;

    /// Put back trxs whose block lost a fork
    fn resend_trxs(&self, trxs: Vec<Trx>) -> Result<()>;
}

/// Read-only view of the group's committed chain
pub trait ChainInfo: Send + Sync {
    fn chain_tip(&self) -> ChainTip;
}

/// What a [`ChannelTrxSender`] forwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrxEvent {
    New(Trx),
    Resend(Vec<Trx>),
}

/// Delegated sender: forwards trxs over a channel to whatever task talks to
/// the producers
#[derive(Debug, Clone)]
pub struct ChannelTrxSender {
    tx: mpsc::UnboundedSender<TrxEvent>,
}

impl ChannelTrxSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrxEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TrxSender for ChannelTrxSender {
    fn send_trx(&self, trx: Trx) -> Result<()> {
        debug!(trx = %trx.trx_id, "forwarding trx");
        self.tx.send(TrxEvent::New(trx)).map_err(|_| anyhow!("trx channel closed"))
    }

    fn resend_trxs(&self, trxs: Vec<Trx>) -> Result<()> {
        debug!(count = trxs.len(), "forwarding trxs for resend");
        self.tx.send(TrxEvent::Resend(trxs)).map_err(|_| anyhow!("trx channel closed"))
    }
}
