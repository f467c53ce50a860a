//! Encoding for state that round-trips through hidden form fields.
//!
//! The server keeps nothing between requests. Whatever the next request needs
//! (questionnaire progress, conversation turns) is serialized to JSON, base64
//! encoded and echoed back by the browser. Decoded values must be validated by
//! the caller before use.

use crate::error::{Result, UpsellerError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Upper bound for an encoded token accepted from the client
pub const MAX_TOKEN_BYTES: usize = 64 * 1024;

/// Serialize `value` to JSON and base64 encode it
pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(json))
}

/// Decode a token produced by [`encode`]
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T> {
    let token = token.trim();
    if token.is_empty() {
        return Err(UpsellerError::InvalidState("empty state token".to_string()));
    }
    if token.len() > MAX_TOKEN_BYTES {
        return Err(UpsellerError::InvalidState(format!(
            "state token too large ({} bytes, limit {})",
            token.len(),
            MAX_TOKEN_BYTES
        )));
    }

    let bytes = STANDARD.decode(token)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decode an optional hidden field, treating a missing or blank field as "no state"
pub fn decode_optional<T: DeserializeOwned>(token: Option<&str>) -> Result<Option<T>> {
    match token.map(str::trim) {
        None | Some("") => Ok(None),
        Some(token) => decode(token).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_token_is_plain_base64_json() {
        let mut map = BTreeMap::new();
        map.insert(1u8, "Fahrrad".to_string());

        let token = encode(&map).unwrap();
        let raw = STANDARD.decode(&token).unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), r#"{"1":"Fahrrad"}"#);

        let back: BTreeMap<u8, String> = decode(&token).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let token = format!("  {}\n", encode(&vec![1, 2, 3]).unwrap());
        let back: Vec<i32> = decode(&token).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let err = decode::<Vec<i32>>("not base64 !!").unwrap_err();
        assert!(matches!(err, UpsellerError::StateDecode(_)));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let token = STANDARD.encode(b"{broken");
        let err = decode::<Vec<i32>>(&token).unwrap_err();
        assert!(matches!(err, UpsellerError::Serialization(_)));
    }

    #[test]
    fn test_rejects_oversized_token() {
        let token = "A".repeat(MAX_TOKEN_BYTES + 4);
        let err = decode::<Vec<i32>>(&token).unwrap_err();
        assert!(matches!(err, UpsellerError::InvalidState(_)));
    }

    #[test]
    fn test_blank_optional_field_means_no_state() {
        assert!(decode_optional::<Vec<i32>>(None).unwrap().is_none());
        assert!(decode_optional::<Vec<i32>>(Some("   ")).unwrap().is_none());

        let token = encode(&vec![7]).unwrap();
        assert_eq!(
            decode_optional::<Vec<i32>>(Some(&token)).unwrap(),
            Some(vec![7])
        );
    }
}
