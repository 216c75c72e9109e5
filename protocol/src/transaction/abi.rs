//! Minimal ABI encoding for the token methods the service needs:
//! `transfer(address,uint256)`, `symbol()` and `decimals()`.

use primitive_types::U256;

use crate::address::{Address, ADDRESS_LENGTH};
use crate::config::{ABI_WORD, DECIMALS_SELECTOR, SYMBOL_SELECTOR, TRANSFER_SELECTOR};

/// A decoded `transfer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    /// `None` when the recipient word is not a left-padded address.
    pub recipient: Option<Address>,
    pub amount: U256,
}

/// Calldata for `transfer(to, amount)`.
pub fn encode_transfer(to: &Address, amount: &U256) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 2 * ABI_WORD);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&address_word(to));
    data.extend_from_slice(&u256_word(amount));
    data
}

/// Decodes `transfer` calldata. Anything shorter than selector plus two
/// words, or with another selector, is not a transfer.
pub fn decode_transfer(data: &[u8]) -> Option<TokenTransfer> {
    if data.len() < 4 + 2 * ABI_WORD || data[..4] != TRANSFER_SELECTOR {
        return None;
    }
    let recipient_word = &data[4..4 + ABI_WORD];
    let amount_word = &data[4 + ABI_WORD..4 + 2 * ABI_WORD];

    let padding = ABI_WORD - ADDRESS_LENGTH;
    let recipient = if recipient_word[..padding].iter().all(|b| *b == 0) {
        Address::from_slice(&recipient_word[padding..]).ok()
    } else {
        None
    };

    Some(TokenTransfer {
        recipient,
        amount: U256::from_big_endian(amount_word),
    })
}

pub fn encode_symbol_call() -> Vec<u8> {
    SYMBOL_SELECTOR.to_vec()
}

pub fn encode_decimals_call() -> Vec<u8> {
    DECIMALS_SELECTOR.to_vec()
}

/// Decodes a `symbol()` return value, either an ABI `string` or a
/// right-padded `bytes32`.
pub fn decode_symbol(output: &[u8]) -> Option<String> {
    if output.len() == ABI_WORD {
        let end = output.iter().position(|b| *b == 0).unwrap_or(ABI_WORD);
        let symbol = std::str::from_utf8(&output[..end]).ok()?;
        return (!symbol.is_empty()).then(|| symbol.to_string());
    }
    decode_string(output)
}

/// Decodes a `decimals()` return value. Must fit in a `uint8`.
pub fn decode_decimals(output: &[u8]) -> Option<u32> {
    if output.len() < ABI_WORD {
        return None;
    }
    let word = U256::from_big_endian(&output[..ABI_WORD]);
    if word > U256::from(u8::MAX) {
        return None;
    }
    Some(word.low_u32())
}

/// Dynamic ABI `string` in a return blob: offset word, then length word,
/// then the bytes.
fn decode_string(output: &[u8]) -> Option<String> {
    let offset = word_as_usize(output, 0)?;
    let len = word_as_usize(output, offset)?;
    let start = offset.checked_add(ABI_WORD)?;
    let end = start.checked_add(len)?;
    let bytes = output.get(start..end)?;
    let s = std::str::from_utf8(bytes).ok()?;
    (!s.is_empty()).then(|| s.to_string())
}

fn word_as_usize(output: &[u8], at: usize) -> Option<usize> {
    let word = output.get(at..at.checked_add(ABI_WORD)?)?;
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return None;
    }
    Some(value.low_u64() as usize)
}

fn address_word(address: &Address) -> [u8; ABI_WORD] {
    let mut word = [0u8; ABI_WORD];
    word[ABI_WORD - ADDRESS_LENGTH..].copy_from_slice(address.as_bytes());
    word
}

pub(crate) fn u256_word(value: &U256) -> [u8; ABI_WORD] {
    let mut word = [0u8; ABI_WORD];
    value.to_big_endian(&mut word);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abi_string(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&u256_word(&U256::from(32u64)));
        out.extend_from_slice(&u256_word(&U256::from(s.len() as u64)));
        let mut body = s.as_bytes().to_vec();
        body.resize(((s.len() + 31) / 32) * 32, 0);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn transfer_roundtrip() {
        let to = Address::from_bytes([0x22; 20]);
        let amount = U256::from(1_000_000u64);
        let data = encode_transfer(&to, &amount);
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);

        let decoded = decode_transfer(&data).unwrap();
        assert_eq!(decoded.recipient, Some(to));
        assert_eq!(decoded.amount, amount);
    }

    #[test]
    fn transfer_requires_selector_and_length() {
        let to = Address::from_bytes([0x22; 20]);
        let data = encode_transfer(&to, &U256::one());
        assert!(decode_transfer(&data[..67]).is_none());

        let mut other = data.clone();
        other[0] = 0x00;
        assert!(decode_transfer(&other).is_none());
    }

    #[test]
    fn dirty_recipient_word_yields_no_recipient() {
        let mut data = encode_transfer(&Address::from_bytes([0x22; 20]), &U256::one());
        data[4] = 0xff;
        let decoded = decode_transfer(&data).unwrap();
        assert!(decoded.recipient.is_none());
        assert_eq!(decoded.amount, U256::one());
    }

    #[test]
    fn symbol_as_string_or_bytes32() {
        assert_eq!(decode_symbol(&abi_string("OCE")).as_deref(), Some("OCE"));

        let mut b32 = [0u8; 32];
        b32[..3].copy_from_slice(b"SHA");
        assert_eq!(decode_symbol(&b32).as_deref(), Some("SHA"));

        assert!(decode_symbol(&[]).is_none());
        assert!(decode_symbol(&[0u8; 32]).is_none());
    }

    #[test]
    fn truncated_string_is_rejected() {
        let mut out = abi_string("TOKEN");
        out.truncate(64 + 2);
        assert!(decode_symbol(&out).is_none());
    }

    #[test]
    fn decimals_word() {
        assert_eq!(decode_decimals(&u256_word(&U256::from(18u64))), Some(18));
        assert!(decode_decimals(&u256_word(&U256::from(256u64))).is_none());
        assert!(decode_decimals(&[0u8; 4]).is_none());
    }
}
