//! Trx payload decryption

use std::sync::Arc;

use quorum_common::cipher::{aes_decrypt, CipherError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("symmetric decryption failed: {0}")]
    Symmetric(#[from] CipherError),

    #[error("no keystore configured for asymmetric decryption")]
    NoKeystore,

    #[error("keystore could not decrypt for {pubkey}: {source}")]
    Keystore {
        pubkey: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Decrypts trx payloads before they are applied
pub trait Decryptor: Send + Sync {
    /// Private-group POSTs, encrypted to the local user's encryption key
    fn decrypt_asymmetric(&self, pubkey: &str, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError>;

    /// Everything else, encrypted with the group cipher key
    fn decrypt_symmetric(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, DecryptError>;
}

/// Holder of the node's encryption key pairs
pub trait Keystore: Send + Sync {
    fn encrypt(&self, encrypt_pubkey: &str, plaintext: &[u8]) -> anyhow::Result<Vec<u8>>;
    fn decrypt(&self, encrypt_pubkey: &str, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Default decryptor: AES-256-GCM for group payloads, keystore for
/// private posts
#[derive(Clone, Default)]
pub struct GroupCipher {
    keystore: Option<Arc<dyn Keystore>>,
}

impl GroupCipher {
    pub fn new(keystore: Arc<dyn Keystore>) -> Self {
        Self {
            keystore: Some(keystore),
        }
    }

    /// Symmetric only; private groups cannot be decrypted
    pub fn without_keystore() -> Self {
        Self::default()
    }
}

impl Decryptor for GroupCipher {
    fn decrypt_asymmetric(&self, pubkey: &str, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
        let keystore = self.keystore.as_ref().ok_or(DecryptError::NoKeystore)?;
        keystore.decrypt(pubkey, ciphertext).map_err(|source| DecryptError::Keystore {
            pubkey: pubkey.to_string(),
            source,
        })
    }

    fn decrypt_symmetric(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, DecryptError> {
        Ok(aes_decrypt(key, ciphertext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use quorum_common::cipher::aes_encrypt;

    struct OneKey;

    impl Keystore for OneKey {
        fn encrypt(&self, _encrypt_pubkey: &str, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
            Ok(aes_encrypt(&[1; 32], [0; 12], plaintext)?)
        }

        fn decrypt(&self, encrypt_pubkey: &str, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
            if encrypt_pubkey != "me" {
                bail!("no private key for {encrypt_pubkey}");
            }
            Ok(aes_decrypt(&[1; 32], ciphertext)?)
        }
    }

    #[test]
    fn symmetric_uses_group_key() {
        let sealed = aes_encrypt(&[3; 32], [0; 12], b"x").unwrap();
        let cipher = GroupCipher::without_keystore();
        assert_eq!(cipher.decrypt_symmetric(&sealed, &[3; 32]).unwrap(), b"x");
        assert!(matches!(
            cipher.decrypt_symmetric(&sealed, &[4; 32]),
            Err(DecryptError::Symmetric(CipherError::Authentication))
        ));
    }

    #[test]
    fn asymmetric_goes_through_keystore() {
        let sealed = aes_encrypt(&[1; 32], [0; 12], b"secret").unwrap();
        let cipher = GroupCipher::new(Arc::new(OneKey));
        assert_eq!(cipher.decrypt_asymmetric("me", &sealed).unwrap(), b"secret");
        assert!(matches!(
            cipher.decrypt_asymmetric("you", &sealed),
            Err(DecryptError::Keystore { .. })
        ));
    }

    #[test]
    fn asymmetric_without_keystore_fails() {
        assert!(matches!(
            GroupCipher::without_keystore().decrypt_asymmetric("me", &[]),
            Err(DecryptError::NoKeystore)
        ));
    }
}
