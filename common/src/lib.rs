// Quorum common library - main library exports

pub mod cipher;
pub mod codec;
pub mod crypto;
pub mod hash;
pub mod sender;
pub mod types;

// Flattened re-exports
pub use self::sender::{ChainInfo, ChannelTrxSender, TrxEvent, TrxSender};
pub use self::types::*;
