use sha2::{Digest, Sha256};
use serde_json::Value;
use crate::source::Row;

const NULL_MARKER: u8 = 0x00;
const VALUE_MARKER: u8 = 0x01;
const ROW_SEPARATOR: u8 = 0x1e;

/// Lowercase hex SHA-256 over the canonical encoding of `rows`.
pub fn content_digest(rows: &[Row]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(rows));
    format!("{:x}", hasher.finalize())
}

/// Canonical byte form of an ordered sample.
///
/// Only cell values are encoded, in column order. Each value is a marker
/// byte, then for non-null values a little-endian u32 length and the text
/// rendering. Rows end with a record separator so row boundaries cannot
/// collide.
pub fn canonical_bytes(rows: &[Row]) -> Vec<u8> {
    let mut out = Vec::new();
    for row in rows {
        for value in row.values() {
            match render(value) {
                None => out.push(NULL_MARKER),
                Some(text) => {
                    out.push(VALUE_MARKER);
                    out.extend_from_slice(&(text.len() as u32).to_le_bytes());
                    out.extend_from_slice(text.as_bytes());
                }
            }
        }
        out.push(ROW_SEPARATOR);
    }
    out
}

// Warehouse APIs hand back scalars as strings; lake files carry typed JSON.
fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            Row::new().with("id", 1).with("name", "alice"),
            Row::new().with("id", 2).with("name", Value::Null),
        ]
    }

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(content_digest(&rows()), content_digest(&rows()));
    }

    #[test]
    fn test_digest_is_lowercase_hex_sha256() {
        let digest = content_digest(&rows());
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_empty_sample_digest_is_sha256_of_nothing() {
        assert_eq!(
            content_digest(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_numeric_and_string_scalars_hash_alike() {
        let typed = vec![Row::new().with("id", 42).with("ok", true)];
        let stringly = vec![Row::new().with("ID", "42").with("OK", "true")];
        assert_eq!(content_digest(&typed), content_digest(&stringly));
    }

    #[test]
    fn test_null_differs_from_null_string() {
        let a = vec![Row::new().with("c", Value::Null)];
        let b = vec![Row::new().with("c", "null")];
        assert_ne!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn test_row_order_matters() {
        let mut reversed = rows();
        reversed.reverse();
        assert_ne!(content_digest(&rows()), content_digest(&reversed));
    }

    #[test]
    fn test_row_boundaries_do_not_collide() {
        let one_row = vec![Row::new().with("a", "x").with("b", "y")];
        let two_rows = vec![Row::new().with("a", "x"), Row::new().with("b", "y")];
        assert_ne!(content_digest(&one_row), content_digest(&two_rows));
    }

    #[test]
    fn test_nested_values_render_as_json() {
        let a = vec![Row::new().with("tags", json!(["x", "y"]))];
        let b = vec![Row::new().with("tags", "[\"x\",\"y\"]")];
        assert_eq!(content_digest(&a), content_digest(&b));
    }
}
