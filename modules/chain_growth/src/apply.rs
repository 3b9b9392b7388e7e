//! Application of a block's trxs to the group state

use quorum_common::{Block, EncryptType, GroupChainState, Trx, TrxType};
use tracing::{debug, warn};

use crate::decrypt::Decryptor;
use crate::error::ChainError;
use crate::stores::ChainStore;

/// What applying one block changed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Trxs dispatched to a store mutator
    pub applied: usize,
    /// Trxs seen before; only their metadata was refreshed
    pub refreshed: usize,
    pub producers_updated: bool,
}

fn changes_state(trx_type: TrxType) -> bool {
    matches!(
        trx_type,
        TrxType::Post | TrxType::Auth | TrxType::Producer | TrxType::Announce | TrxType::Schema
    )
}

fn decrypt_payload(
    trx: &Trx,
    state: &GroupChainState,
    decryptor: &dyn Decryptor,
) -> Result<Vec<u8>, ChainError> {
    let result = if trx.trx_type == TrxType::Post && state.encrypt_type == EncryptType::Private {
        decryptor.decrypt_asymmetric(&state.user_encrypt_pubkey, &trx.data)
    } else {
        decryptor.decrypt_symmetric(&trx.data, &state.cipher_key)
    };
    result.map_err(|source| ChainError::DecryptionFailed {
        trx: trx.trx_id,
        source,
    })
}

/// Apply every trx of `block` in order.
///
/// A trx already known to the store is only re-recorded. On error the trxs
/// before the failing one stay applied; applying the block again skips them.
pub fn apply_block(
    block: &Block,
    state: &GroupChainState,
    store: &dyn ChainStore,
    decryptor: &dyn Decryptor,
) -> Result<ApplyReport, ChainError> {
    let mut report = ApplyReport::default();

    for trx in &block.trxs {
        if store.trx_exists(&trx.trx_id)? {
            debug!(trx = %trx.trx_id, "trx already applied, updating metadata only");
            store.put_trx(trx)?;
            report.refreshed += 1;
            continue;
        }

        if !changes_state(trx.trx_type) {
            warn!(trx = %trx.trx_id, trx_type = ?trx.trx_type, "unsupported trx type, skipped");
            store.put_trx(trx)?;
            continue;
        }

        let plaintext = decrypt_payload(trx, state, decryptor)?;
        match trx.trx_type {
            TrxType::Post => store.apply_post(trx, &plaintext)?,
            TrxType::Auth => store.apply_permission_update(trx, &plaintext)?,
            TrxType::Producer => {
                store.apply_producer_update(trx, &plaintext)?;
                report.producers_updated = true;
            }
            TrxType::Announce => store.apply_announcement(trx, &plaintext)?,
            TrxType::Schema => store.apply_schema_update(trx, &plaintext)?,
            _ => {}
        }
        store.put_trx(trx)?;
        report.applied += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decrypt::GroupCipher;
    use crate::stores::MemoryChainStore;
    use quorum_common::{ItemAction, ProducerItem, PublicKey};
    use quorum_test_utils::{TestProducer, TestUser, CIPHER_KEY};

    fn state() -> GroupChainState {
        GroupChainState {
            cipher_key: CIPHER_KEY.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn applies_each_trx_once() {
        let producer = TestProducer::new(1);
        let user = TestUser::new(2);
        let store = MemoryChainStore::new();
        let block = producer.block(&producer.genesis(), vec![user.post(1), user.post(2)]);
        let cipher = GroupCipher::without_keystore();

        let first = apply_block(&block, &state(), &store, &cipher).unwrap();
        assert_eq!(first.applied, 2);
        assert_eq!(store.post(&user.post(1).trx_id), Some(b"post #1".to_vec()));

        let second = apply_block(&block, &state(), &store, &cipher).unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.refreshed, 2);
        assert_eq!(store.post_count(), 2);
    }

    #[test]
    fn producer_trx_flags_update() {
        let producer = TestProducer::new(1);
        let user = TestUser::new(2);
        let store = MemoryChainStore::new();
        let item = ProducerItem {
            producer_pubkey: PublicKey::new([8; 32]),
            action: ItemAction::Add,
        };
        let trx = user.item_trx(1, TrxType::Producer, &item);
        let block = producer.block(&producer.genesis(), vec![trx]);

        let report =
            apply_block(&block, &state(), &store, &GroupCipher::without_keystore()).unwrap();
        assert!(report.producers_updated);
        assert_eq!(store.producers().unwrap(), vec![PublicKey::new([8; 32])]);
    }

    #[test]
    fn decryption_failure_stops_at_failing_trx() {
        let producer = TestProducer::new(1);
        let user = TestUser::new(2);
        let store = MemoryChainStore::new();
        let bad = user.trx_with_data(2, TrxType::Post, vec![0; 40]);
        let block = producer.block(&producer.genesis(), vec![user.post(1), bad, user.post(3)]);

        let err =
            apply_block(&block, &state(), &store, &GroupCipher::without_keystore()).unwrap_err();
        assert!(matches!(err, ChainError::DecryptionFailed { trx, .. } if trx == user.post(2).trx_id));
        assert!(store.trx_exists(&user.post(1).trx_id).unwrap());
        assert!(!store.trx_exists(&user.post(3).trx_id).unwrap());
    }

    #[test]
    fn private_posts_need_keystore() {
        let producer = TestProducer::new(1);
        let user = TestUser::new(2);
        let store = MemoryChainStore::new();
        let block = producer.block(&producer.genesis(), vec![user.post(1)]);
        let private = GroupChainState {
            encrypt_type: EncryptType::Private,
            ..state()
        };

        let err =
            apply_block(&block, &private, &store, &GroupCipher::without_keystore()).unwrap_err();
        assert!(matches!(err, ChainError::DecryptionFailed { .. }));
    }

    #[test]
    fn non_state_trx_is_recorded_without_decrypting() {
        let producer = TestProducer::new(1);
        let user = TestUser::new(2);
        let store = MemoryChainStore::new();
        let sync = user.trx_with_data(1, TrxType::ReqBlockForward, vec![1, 2, 3]);
        let block = producer.block(&producer.genesis(), vec![sync.clone()]);

        let report =
            apply_block(&block, &state(), &store, &GroupCipher::without_keystore()).unwrap();
        assert_eq!(report.applied, 0);
        assert!(store.trx_exists(&sync.trx_id).unwrap());
    }
}
