//! 20-byte account addresses.
//!
//! Addresses are parsed from `0x`-prefixed hex (case-insensitive) and always
//! rendered lowercase, so string comparison of rendered addresses is a
//! case-insensitive comparison of the inputs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::MeshError;

/// Address width in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// An account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds an address from a slice that must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MeshError> {
        let arr: [u8; ADDRESS_LENGTH] = bytes.try_into().map_err(|_| {
            MeshError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl FromStr for Address {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| MeshError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;
        if hex_part.len() != ADDRESS_LENGTH * 2 {
            return Err(MeshError::InvalidAddress(format!(
                "expected 40 hex characters: {}",
                s
            )));
        }
        let bytes =
            hex::decode(hex_part).map_err(|_| MeshError::InvalidAddress(s.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
