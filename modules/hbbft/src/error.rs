//! Error types for the HoneyBadger coordinator.

use quorum_common::codec::CodecError;
use quorum_common::TrxId;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Pushing an already buffered trx changes nothing.
    #[error("trx {0} already buffered")]
    Duplicate(TrxId),
}

#[derive(Debug, thiserror::Error)]
pub enum HbError {
    /// The epoch's ACS instance failed. Consensus stays halted until
    /// [`HoneyBadger::resume`](crate::HoneyBadger::resume).
    #[error("agreement for epoch {epoch} failed: {source}")]
    Agreement {
        epoch: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Block production did not take the agreed batch; its trxs are
    /// pending again.
    #[error("block production failed for epoch {epoch}: {source}")]
    Production {
        epoch: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("consensus halted after failure in epoch {epoch}")]
    Halted { epoch: u64 },

    #[error("could not encode proposal: {0}")]
    Codec(#[from] CodecError),
}
