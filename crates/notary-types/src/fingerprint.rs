use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length in bytes of every fingerprint and Merkle node.
pub const FINGERPRINT_LEN: usize = 32;

/// SHA-256 content hash identifying an artifact's exact bytes.
///
/// Fingerprints are compared byte-wise and ordered byte-wise; the ordering is
/// what the Merkle builder uses to canonicalize leaves. The external form is
/// lowercase hex, optionally `0x`-prefixed on input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

/// Interior Merkle nodes and roots share the fingerprint representation.
pub type NodeHash = Fingerprint;

impl Fingerprint {
    /// Wrap a pre-computed 32-byte hash.
    pub const fn from_hash(hash: [u8; FINGERPRINT_LEN]) -> Self {
        Self(hash)
    }

    /// Build from a byte slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; FINGERPRINT_LEN] =
            bytes.try_into().map_err(|_| TypeError::InvalidLength {
                expected: FINGERPRINT_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Parse from hex, with or without a `0x` prefix. Case-insensitive.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        let stripped = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Lowercase hex with a `0x` prefix, as ledgers usually display it.
    pub fn to_hex_prefixed(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; FINGERPRINT_LEN]> for Fingerprint {
    fn from(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<Fingerprint> for [u8; FINGERPRINT_LEN] {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hex_roundtrip() {
        let fp = Fingerprint::from_hex(SAMPLE).unwrap();
        assert_eq!(fp.to_hex(), SAMPLE);
    }

    #[test]
    fn accepts_prefix_and_uppercase() {
        let plain = Fingerprint::from_hex(SAMPLE).unwrap();
        let prefixed = Fingerprint::from_hex(&format!("0x{SAMPLE}")).unwrap();
        let upper = Fingerprint::from_hex(&SAMPLE.to_uppercase()).unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain, upper);
        assert_eq!(plain.to_hex_prefixed(), format!("0x{SAMPLE}"));
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Fingerprint::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
        assert!(Fingerprint::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(matches!(
            Fingerprint::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn ordering_is_bytewise() {
        let low = Fingerprint::from_hash([0; 32]);
        let mut high_bytes = [0u8; 32];
        high_bytes[0] = 1;
        let high = Fingerprint::from_hash(high_bytes);
        assert!(low < high);
    }

    #[test]
    fn serde_uses_hex_string() {
        let fp = Fingerprint::from_hex(SAMPLE).unwrap();
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{SAMPLE}\""));

        let prefixed: Fingerprint = serde_json::from_str(&format!("\"0x{SAMPLE}\"")).unwrap();
        assert_eq!(prefixed, fp);
    }

    #[test]
    fn serde_rejects_short_hash() {
        assert!(serde_json::from_str::<Fingerprint>("\"abcd\"").is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_bytes_survive_hex(bytes in proptest::array::uniform32(any::<u8>())) {
                let fp = Fingerprint::from_hash(bytes);
                prop_assert_eq!(Fingerprint::from_hex(&fp.to_hex_prefixed()).unwrap(), fp);
            }
        }
    }
}
