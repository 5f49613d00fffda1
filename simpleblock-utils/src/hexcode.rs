//! Fixed-width hexadecimal encodings used to keep binary data in string-only
//! key-value stores.
//!
//! Bytes are always two lowercase digits and words are always eight, so an
//! encoded sector has a length that can be checked before decoding.

/// Number of hex digits in an encoded word.
pub const WORD_DIGITS: usize = 8;

/// Encode each byte as two lowercase hex digits.
pub fn encode_bytes(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a string produced by `encode_bytes` into exactly `len` bytes.
/// Returns `None` if the length is wrong or any digit is invalid.
pub fn decode_bytes(str: &str, len: usize) -> Option<Vec<u8>> {
    if str.len() != len * 2 {
        return None;
    }
    let mut bytes = vec![0; len];
    hex::decode_to_slice(str, &mut bytes).ok()?;
    Some(bytes)
}

/// Encode a word as exactly eight lowercase hex digits.
pub fn encode_word(word: u32) -> String {
    hex::encode(word.to_be_bytes())
}

/// Decode an eight-digit word. Anything else is rejected.
pub fn decode_word(str: &str) -> Option<u32> {
    if str.len() != WORD_DIGITS {
        return None;
    }
    let mut bytes = [0; 4];
    hex::decode_to_slice(str, &mut bytes).ok()?;
    Some(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_are_two_digits() {
        assert_eq!(encode_bytes(&[0x00, 0x0F, 0xA0, 0xFF]), "000fa0ff");
        assert_eq!(encode_bytes(&[]), "");
    }

    #[test]
    fn test_decode_bytes() {
        assert_eq!(decode_bytes("000fa0ff", 4), Some(vec![0x00, 0x0F, 0xA0, 0xFF]));
        // Upper case is tolerated.
        assert_eq!(decode_bytes("A0Ff", 2), Some(vec![0xA0, 0xFF]));
    }

    #[test]
    fn test_decode_bytes_rejects_bad_input() {
        assert_eq!(decode_bytes("000", 2), None);
        assert_eq!(decode_bytes("0000", 1), None);
        assert_eq!(decode_bytes("0g", 1), None);
        assert_eq!(decode_bytes("+1", 1), None);
    }

    #[test]
    fn test_words() {
        assert_eq!(encode_word(0), "00000000");
        assert_eq!(encode_word(0xDEADBEEF), "deadbeef");
        assert_eq!(encode_word(0x1F), "0000001f");
        assert_eq!(decode_word("deadbeef"), Some(0xDEADBEEF));
        assert_eq!(decode_word("ffffffff"), Some(u32::MAX));
        assert_eq!(decode_word("0000001F"), Some(0x1F));
        assert_eq!(decode_word("1f"), None);
        assert_eq!(decode_word("00000000f"), None);
        assert_eq!(decode_word("0000000x"), None);
    }
}
