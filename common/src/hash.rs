//! Fixed-size byte identifiers

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, ops::Deref, str::FromStr};

/// `N` opaque bytes, shown and serialised as lowercase hex.
///
/// On the CBOR wire it is a plain byte string of exactly `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const N: usize>([u8; N]);

impl<const N: usize> Hash<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// All zeroes; a genesis block points at this as its parent
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; N]
    }
}

impl<const N: usize> Default for Hash<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> From<[u8; N]> for Hash<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> Deref for Hash<N> {
    type Target = [u8; N];

    fn deref(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> AsRef<[u8]> for Hash<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl<const N: usize> fmt::Debug for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{N}>({self})")
    }
}

impl<const N: usize> FromStr for Hash<N> {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; N];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl<const N: usize> Serialize for Hash<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, const N: usize> Deserialize<'de> for Hash<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

impl<C, const N: usize> minicbor::Encode<C> for Hash<N> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

impl<'b, C, const N: usize> minicbor::Decode<'b, C> for Hash<N> {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes: [u8; N] = d
            .bytes()?
            .try_into()
            .map_err(|_| minicbor::decode::Error::message("identifier has the wrong length"))?;
        Ok(Self(bytes))
    }
}

/// Declares a documented alias of [`Hash`]
#[macro_export]
macro_rules! declare_hash_type {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        pub type $name = $crate::hash::Hash<$size>;
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parses_back() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let id = Hash::new(bytes);
        assert!(id.to_string().starts_with("ab00"));
        assert_eq!(id.to_string().parse::<Hash<32>>().unwrap(), id);
    }

    #[test]
    fn short_hex_is_rejected() {
        assert!("abcd".parse::<Hash<32>>().is_err());
    }

    #[test]
    fn cbor_length_is_checked() {
        let bytes = minicbor::to_vec(Hash::<28>::default()).unwrap();
        assert!(minicbor::decode::<Hash<32>>(&bytes).is_err());
        let bytes = minicbor::to_vec(Hash::new([5u8; 32])).unwrap();
        assert_eq!(minicbor::decode::<Hash<32>>(&bytes).unwrap(), Hash::new([5u8; 32]));
    }

    #[test]
    fn zero_marker() {
        assert!(Hash::<32>::default().is_zero());
        assert!(!Hash::new([1u8; 32]).is_zero());
    }
}
