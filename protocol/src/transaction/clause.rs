//! Clauses and the capability trait the mapper reads them through.
//!
//! Clauses reach the mapper in two shapes: typed [`Clause`] values decoded
//! from transaction bytes, and JSON-shaped [`ApiClause`] values returned by
//! the chain node. Both implement [`ClauseLike`], so the mapping logic is
//! written once.

use primitive_types::U256;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::types::{decode_hex_bytes, encode_hex_bytes, parse_quantity, quantity_to_hex};
use crate::address::Address;
use crate::client::types::ApiClause;
use crate::error::{MeshError, Result};

/// One `{to, value, data}` unit of a transaction. `to == None` creates a
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Clause {
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

impl Clause {
    pub fn new(to: Option<Address>, value: U256, data: Vec<u8>) -> Self {
        Self { to, value, data }
    }

    /// Plain native-coin transfer.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self::new(Some(to), value, Vec::new())
    }

    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// JSON form: `{"to": "0x…" | null, "value": "0x…", "data": "0x…"}`.
impl Serialize for Clause {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Clause", 3)?;
        state.serialize_field("to", &self.to.map(|a| a.to_string()))?;
        state.serialize_field("value", &quantity_to_hex(&self.value))?;
        state.serialize_field("data", &encode_hex_bytes(&self.data))?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// ClauseLike
// ---------------------------------------------------------------------------

/// Read access to a clause regardless of where it came from.
///
/// Accessors are fallible because loosely typed sources may carry
/// malformed fields; a failure aborts the whole mapping.
pub trait ClauseLike {
    fn to(&self) -> Result<Option<Address>>;
    fn value(&self) -> Result<U256>;
    fn data(&self) -> Result<Vec<u8>>;
}

impl ClauseLike for Clause {
    fn to(&self) -> Result<Option<Address>> {
        Ok(self.to)
    }

    fn value(&self) -> Result<U256> {
        Ok(self.value)
    }

    fn data(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

impl ClauseLike for ApiClause {
    fn to(&self) -> Result<Option<Address>> {
        match self.to.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }

    fn value(&self) -> Result<U256> {
        parse_quantity(&self.value)
            .map_err(|e| MeshError::InvalidValue(format!("clause value {}: {}", self.value, e)))
    }

    fn data(&self) -> Result<Vec<u8>> {
        if self.data.is_empty() {
            return Ok(Vec::new());
        }
        decode_hex_bytes(&self.data)
    }
}

impl<T: ClauseLike + ?Sized> ClauseLike for &T {
    fn to(&self) -> Result<Option<Address>> {
        (**self).to()
    }

    fn value(&self) -> Result<U256> {
        (**self).value()
    }

    fn data(&self) -> Result<Vec<u8>> {
        (**self).data()
    }
}
