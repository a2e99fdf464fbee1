//! Identifier and Timestamp Helpers
//!
//! Entity ids are 26-character opaque strings: a random v4 UUID rendered in an
//! unpadded base32 alphabet that avoids visually ambiguous characters.

use chrono::Utc;
use uuid::Uuid;

/// Length of every generated entity id.
pub const ID_LENGTH: usize = 26;

const ENCODING: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// Generate a fresh 26-character id.
pub fn new_id() -> String {
    encode(Uuid::new_v4().as_bytes())
}

fn encode(bytes: &[u8; 16]) -> String {
    let mut out = String::with_capacity(ID_LENGTH);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ENCODING[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ENCODING[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

/// Whether `id` has the shape of a generated id.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Current time in milliseconds since the Unix epoch.
pub fn get_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_has_expected_length() {
        let id = new_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(is_valid_id(&id));
    }

    #[test]
    fn test_new_id_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_id_uses_alphabet() {
        let id = new_id();
        assert!(id.bytes().all(|b| ENCODING.contains(&b)));
    }

    #[test]
    fn test_encode_zero_bytes() {
        assert_eq!(encode(&[0u8; 16]), "y".repeat(26));
    }

    #[test]
    fn test_is_valid_id_rejects_wrong_length() {
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id(&"a".repeat(27)));
        assert!(!is_valid_id(&format!("{}-", "a".repeat(25))));
    }

    #[test]
    fn test_get_millis_is_recent() {
        let now = get_millis();
        assert!(now > 1_600_000_000_000);
    }
}
