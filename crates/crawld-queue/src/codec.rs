//! Payload codec: JSON restricted to 7-bit ASCII.
//!
//! Stored bytes must survive any storage or transport path without
//! re-encoding, so every non-ASCII character is written as a `\uXXXX`
//! escape. JSON keeps all non-ASCII inside string literals, which makes
//! the character-level escape pass below lossless.

use std::fmt::Write;

use crate::error::{QueueError, Result};
use crate::types::Job;

/// Serialise a job to ASCII-clean JSON bytes.
pub fn encode(job: &Job) -> Result<Vec<u8>> {
    let text = serde_json::to_string(job).map_err(QueueError::Encode)?;
    Ok(escape_non_ascii(&text).into_bytes())
}

/// Inverse of [`encode`]. Fails on malformed input — rows written by
/// other processes or versions are not trusted to be well formed.
pub fn decode(bytes: &[u8]) -> Result<Job> {
    serde_json::from_slice(bytes).map_err(QueueError::Decode)
}

/// Replace every non-ASCII character with `\uXXXX` escapes, one per
/// UTF-16 code unit (surrogate pairs above the BMP).
fn escape_non_ascii(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn job(name: &str, value: Value) -> Job {
        match value {
            Value::Object(map) => Job::new(name, map),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn roundtrips_nested_values() {
        let original = job(
            "fetch",
            json!({
                "seed": "https://example.org/start",
                "depth": 3,
                "ratio": 0.25,
                "follow": true,
                "referer": null,
                "headers": {"accept": ["text/html", "application/json"]}
            }),
        );
        let bytes = encode(&original).expect("encode");
        let back = decode(&bytes).expect("decode");
        assert_eq!(back, original);
    }

    #[test]
    fn output_is_ascii_clean() {
        let original = job("fetch", json!({"city": "Zürich", "note": "näive 🕷"}));
        let bytes = encode(&original).expect("encode");
        assert!(bytes.is_ascii());
        assert_eq!(decode(&bytes).expect("decode"), original);
    }

    #[test]
    fn non_bmp_survives_surrogate_escaping() {
        let spider = "🕷";
        let original = job(spider, Value::Object(Map::new()));
        let bytes = encode(&original).expect("encode");
        let text = std::str::from_utf8(&bytes).expect("utf8");
        assert!(text.contains("\\ud83d\\udd77"));
        assert_eq!(decode(&bytes).expect("decode").name, spider);
    }

    #[test]
    fn malformed_input_fails_to_decode() {
        assert!(matches!(decode(b"not json"), Err(QueueError::Decode(_))));
        assert!(matches!(decode(b"[1, 2]"), Err(QueueError::Decode(_))));
    }
}
