//! Minimal contract ABI codec
//!
//! Just enough of the Solidity ABI to perform the gateway's read-only calls:
//! zero-argument and single-string-argument functions returning `bool`,
//! `(address, string)`, or `bytes`. Everything is 32-byte words; dynamic
//! values are a word-aligned offset into the payload, then a length word,
//! then the raw bytes padded to a word boundary.

use sha3::{Digest, Keccak256};

use crate::types::{Result, SwitchboardError};

const WORD: usize = 32;

/// First four bytes of the Keccak-256 hash of the function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Encode a call to a zero-argument function
pub fn encode_call(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

/// Encode a call to a function taking a single `string` argument
pub fn encode_call_string(signature: &str, arg: &str) -> Vec<u8> {
    let bytes = arg.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;

    let mut out = Vec::with_capacity(4 + WORD * 2 + padded);
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&uint_word(WORD as u64)); // offset of the dynamic data
    out.extend_from_slice(&uint_word(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out.resize(4 + WORD * 2 + padded, 0);
    out
}

/// Decode a single `bool` return value
pub fn decode_bool(data: &[u8]) -> Result<bool> {
    need(data, WORD)?;
    Ok(data[..WORD].iter().any(|b| *b != 0))
}

/// Decode an `(address, string)` return tuple
pub fn decode_address_string(data: &[u8]) -> Result<(String, String)> {
    need(data, WORD * 2)?;

    let address = format!("0x{}", hex::encode(&data[12..WORD]));
    let offset = word_to_usize(&data[WORD..WORD * 2])?;
    let bytes = decode_dynamic_at(data, offset)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| SwitchboardError::Directory(format!("returned string is not UTF-8: {e}")))?;

    Ok((address, text))
}

/// Decode a single dynamic `bytes` (or `string`) return value
pub fn decode_bytes(data: &[u8]) -> Result<Vec<u8>> {
    need(data, WORD)?;
    let offset = word_to_usize(&data[..WORD])?;
    decode_dynamic_at(data, offset)
}

/// Decode a single dynamic return value as UTF-8 text
pub fn decode_string(data: &[u8]) -> Result<String> {
    let bytes = decode_bytes(data)?;
    String::from_utf8(bytes)
        .map_err(|e| SwitchboardError::Directory(format!("returned string is not UTF-8: {e}")))
}

/// Hex-encode call data with the 0x prefix eth_call expects
pub fn to_hex_data(call: &[u8]) -> String {
    format!("0x{}", hex::encode(call))
}

/// Decode an eth_call result string ("0x...") into bytes
pub fn from_hex_result(result: &str) -> Result<Vec<u8>> {
    let stripped = result.strip_prefix("0x").unwrap_or(result);
    hex::decode(stripped)
        .map_err(|e| SwitchboardError::Directory(format!("invalid hex in eth_call result: {e}")))
}

/// Length word + raw bytes at `offset` (relative to the start of `data`)
fn decode_dynamic_at(data: &[u8], offset: usize) -> Result<Vec<u8>> {
    need(data, offset.saturating_add(WORD))?;
    let len = word_to_usize(&data[offset..offset + WORD])?;
    need(data, offset.saturating_add(WORD).saturating_add(len))?;
    Ok(data[offset + WORD..offset + WORD + len].to_vec())
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_to_usize(word: &[u8]) -> Result<usize> {
    if word.len() != WORD || word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(SwitchboardError::Directory(
            "length or offset word out of range".to_string(),
        ));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf) as usize)
}

fn need(data: &[u8], len: usize) -> Result<()> {
    if data.len() < len {
        return Err(SwitchboardError::Directory(format!(
            "return data too short: need {len} bytes, have {}",
            data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_four_bytes_and_distinct() {
        let a = selector("getBestNode()");
        let b = selector("validateStreamId(string)");
        assert_ne!(a, b);
        assert_eq!(encode_call("getBestNode()"), a.to_vec());
    }

    #[test]
    fn test_known_selector_vector() {
        // keccak256("transfer(address,uint256)")[..4] == a9059cbb
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_encode_call_string_layout() {
        let call = encode_call_string("validateStreamId(string)", "abc");

        // selector + offset word + length word + one padded data word
        assert_eq!(call.len(), 4 + 32 + 32 + 32);
        assert_eq!(&call[..4], &selector("validateStreamId(string)"));
        assert_eq!(call[4..36], uint_word(0x20));
        assert_eq!(call[36..68], uint_word(3));
        assert_eq!(&call[68..71], b"abc");
        assert!(call[71..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_call_string_word_boundary() {
        // Exactly one word of data needs no extra padding word
        let call = encode_call_string("f(string)", &"x".repeat(32));
        assert_eq!(call.len(), 4 + 32 + 32 + 32);

        // One byte over spills into a second data word
        let call = encode_call_string("f(string)", &"x".repeat(33));
        assert_eq!(call.len(), 4 + 32 + 32 + 64);
    }

    #[test]
    fn test_encode_call_empty_string() {
        let call = encode_call_string("f(string)", "");
        assert_eq!(call.len(), 4 + 32 + 32);
        assert_eq!(call[36..68], uint_word(0));
    }

    #[test]
    fn test_decode_bool() {
        let mut word = [0u8; 32];
        assert!(!decode_bool(&word).unwrap());
        word[31] = 1;
        assert!(decode_bool(&word).unwrap());
        assert!(decode_bool(&[]).is_err());
    }

    #[test]
    fn test_decode_address_string() {
        // (address, string) with the string "http://node-0:8545"
        let text = b"http://node-0:8545";
        let mut data = Vec::new();
        let mut addr_word = [0u8; 32];
        addr_word[31] = 0xa1;
        data.extend_from_slice(&addr_word);
        data.extend_from_slice(&uint_word(0x40)); // offset of string
        data.extend_from_slice(&uint_word(text.len() as u64));
        data.extend_from_slice(text);
        data.resize(data.len() + (32 - text.len() % 32), 0);

        let (address, endpoint) = decode_address_string(&data).unwrap();
        assert_eq!(address, "0x00000000000000000000000000000000000000a1");
        assert_eq!(endpoint, "http://node-0:8545");
    }

    #[test]
    fn test_decode_string_roundtrip() {
        let text = b"stream-payload";
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(0x20));
        data.extend_from_slice(&uint_word(text.len() as u64));
        data.extend_from_slice(text);
        data.resize(data.len() + (32 - text.len() % 32), 0);

        assert_eq!(decode_string(&data).unwrap(), "stream-payload");
    }

    #[test]
    fn test_decode_rejects_truncated_dynamic_data() {
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(0x20));
        data.extend_from_slice(&uint_word(100)); // claims 100 bytes, has none
        assert!(decode_bytes(&data).is_err());
    }

    #[test]
    fn test_oversized_offset_word_is_rejected() {
        let mut data = vec![0xffu8; 64];
        data[32..].fill(0);
        assert!(decode_bytes(&data).is_err());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex_data(&[0xa9, 0x05]), "0xa905");
        assert_eq!(from_hex_result("0xa905").unwrap(), vec![0xa9, 0x05]);
        assert_eq!(from_hex_result("a905").unwrap(), vec![0xa9, 0x05]);
        assert!(from_hex_result("0xzz").is_err());
    }
}
