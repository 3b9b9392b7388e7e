//! Quorum chain growth module
//! Accepts candidate blocks for one group, links them into the committed
//! chain, resolves forks and applies the trxs they carry.

pub mod apply;
pub mod chain_engine;
pub mod configuration;
pub mod decrypt;
pub mod error;
pub mod observer;
pub mod stores;
pub mod user;
pub mod validation;

pub use chain_engine::{AcceptOutcome, ChainGrowthEngine, ChainStateHandle};
pub use configuration::ChainGrowthConfig;
pub use decrypt::{DecryptError, Decryptor, GroupCipher, Keystore};
pub use error::{ChainError, InvalidBlockReason};
pub use observer::{ChainObserver, NoOpObserver};
pub use stores::{BlockLocation, ChainStore, MemoryChainStore};
pub use user::GroupUser;
