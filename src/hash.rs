//! Stable 32-bit FNV-1a hashing
//!
//! Seeds derived from these digests must reproduce across runs, processes and
//! platforms, so the std `Hasher` (randomly keyed) cannot be used here.

use crate::schema::Value;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a digest of the UTF-8 bytes of `s`
pub fn stable_hash_str(s: &str) -> u32 {
    s.as_bytes().iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Digest of a value's string form; `Null` hashes to `0`
pub fn stable_hash(value: &Value) -> u32 {
    match value {
        Value::Null => 0,
        Value::Text(s) => stable_hash_str(s),
        other => stable_hash_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(stable_hash_str(""), 0x811c_9dc5);
        assert_eq!(stable_hash_str("a"), 0xe40c_292c);
        assert_eq!(stable_hash_str("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_null_is_zero() {
        assert_eq!(stable_hash(&Value::Null), 0);
    }

    #[test]
    fn test_string_form_drives_digest() {
        assert_eq!(stable_hash(&Value::Int(42)), stable_hash_str("42"));
        assert_eq!(stable_hash(&Value::from("42")), stable_hash(&Value::Int(42)));
        assert_ne!(stable_hash(&Value::Int(42)), stable_hash(&Value::Int(43)));
    }

    #[test]
    fn test_multibyte_input() {
        // Same digest regardless of how the string was built
        let composed = format!("{}{}", "caf", "\u{e9}");
        assert_eq!(stable_hash_str(&composed), stable_hash_str("caf\u{e9}"));
        assert_ne!(stable_hash_str("caf\u{e9}"), stable_hash_str("cafe"));
    }
}
