//! Asynchronous common subset, driven as an opaque per-epoch instance

use std::collections::BTreeMap;

use anyhow::Result;
use quorum_common::NodeId;

/// Progress reported by an ACS instance after each input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcsStep {
    /// More messages are needed
    Pending,
    /// Agreed proposals, one per contributing participant
    Decided(BTreeMap<NodeId, Vec<u8>>),
}

/// One epoch's agreement
///
/// The instance sends its own protocol messages; it only reports whether it
/// has decided.
pub trait AcsInstance: Send {
    /// This node's proposal for the epoch
    fn input_value(&mut self, value: Vec<u8>) -> Result<AcsStep>;

    /// A protocol message from another participant
    fn handle_message(&mut self, sender: &NodeId, payload: &[u8]) -> Result<AcsStep>;
}

/// Creates the instance for a new epoch
pub trait AcsFactory: Send + Sync {
    fn create(&self, epoch: u64) -> Result<Box<dyn AcsInstance>>;
}
