//! CBOR wire codec for blocks, trxs and agreement bundles

use crate::types::{Trx, TrxBundle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    #[error("CBOR decoding failed: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

/// Encode any wire type to CBOR
pub fn to_cbor<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, CodecError> {
    minicbor::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode any wire type from CBOR
pub fn from_cbor<'b, T: minicbor::Decode<'b, ()>>(bytes: &'b [u8]) -> Result<T, CodecError> {
    Ok(minicbor::decode(bytes)?)
}

/// Encode the trxs a node proposes for one epoch
pub fn encode_bundle(trxs: Vec<Trx>) -> Result<Vec<u8>, CodecError> {
    to_cbor(&TrxBundle { trxs })
}

/// Decode a proposal received through agreement
pub fn decode_bundle(bytes: &[u8]) -> Result<Vec<Trx>, CodecError> {
    let bundle: TrxBundle = from_cbor(bytes)?;
    Ok(bundle.trxs)
}
