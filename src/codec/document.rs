//! Structured documents: the Object codec, user metadata, and the
//! two-step parser shared with the container header.
//!
//! Documents are modelled as [`serde_json::Value`] (mappings, sequences,
//! strings, numbers, booleans, null). New documents are serialized as YAML.
//! Parsing tries YAML first and falls back to strict JSON, which is what
//! early revisions of the format wrote.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RabError;

/// Convert any serializable value into the generic document model.
///
/// Numerical arrays serialize as plain nested sequences, so arrays embedded in
/// objects or metadata survive a round trip through any other runtime.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Value, RabError> {
    Ok(serde_json::to_value(value)?)
}

/// Validate user metadata: a mapping, or null for "no metadata"
pub fn normalize_metadata(metadata: Value) -> Result<Value, RabError> {
    match metadata {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(metadata),
        other => Err(RabError::ValidationError(format!(
            "metadata must be a mapping when provided, got {}",
            kind_of(&other)
        ))),
    }
}

/// Serialize a document with the canonical (YAML) serializer
pub fn serialize_document<T: Serialize + ?Sized>(value: &T) -> Result<String, RabError> {
    Ok(serde_yaml::to_string(value)?)
}

/// Parse a document with YAML, falling back to strict JSON
pub fn parse_document<T: DeserializeOwned>(text: &str) -> Result<T, RabError> {
    match serde_yaml::from_str(text) {
        Ok(value) => Ok(value),
        Err(yaml_error) => {
            log::warn!(
                "YAML parse failed ({}), retrying as JSON",
                yaml_error
            );
            serde_json::from_str(text).map_err(|json_error| {
                RabError::FormatError(format!(
                    "document is neither YAML ({}) nor JSON ({})",
                    yaml_error, json_error
                ))
            })
        }
    }
}

/// Encode an Object payload; the document must be a mapping
pub fn encode_object(document: &Value) -> Result<Vec<u8>, RabError> {
    if !document.is_object() {
        return Err(RabError::ValidationError(format!(
            "object datasets must be mappings, got {}",
            kind_of(document)
        )));
    }
    Ok(serialize_document(document)?.into_bytes())
}

/// Decode an Object payload
pub fn decode_object(bytes: &[u8]) -> Result<Value, RabError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RabError::FormatError(format!("object is not valid UTF-8: {}", e)))?;
    parse_document(text)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_roundtrip() {
        let object = json!({
            "firstname": "Johnny",
            "lastname": "Bravo",
            "address": {"country": "USA", "state": "NY"},
            "scores": [1, 2.5, -3],
            "active": true,
            "nothing": null
        });

        let bytes = encode_object(&object).unwrap();
        assert_eq!(decode_object(&bytes).unwrap(), object);
    }

    #[test]
    fn test_non_ascii_roundtrip() {
        let object = json!({"artist": "Albrecht Dürer", "title": "犀牛"});
        let bytes = encode_object(&object).unwrap();
        assert_eq!(decode_object(&bytes).unwrap(), object);
    }

    #[test]
    fn test_object_must_be_mapping() {
        let result = encode_object(&json!([1, 2, 3]));
        assert!(matches!(result, Err(RabError::ValidationError(_))));
    }

    #[test]
    fn test_tab_indented_json_parses() {
        let text = "{\n\t\"name\": \"tabbed\",\n\t\"size\": 3\n}";
        let value: Value = parse_document(text).unwrap();
        assert_eq!(value, json!({"name": "tabbed", "size": 3}));
    }

    #[test]
    fn test_unparseable_is_format_error() {
        let result: Result<Value, _> = parse_document("key: [unclosed\n\t}");
        assert!(matches!(result, Err(RabError::FormatError(_))));
    }

    #[test]
    fn test_metadata_normalization() {
        assert_eq!(normalize_metadata(Value::Null).unwrap(), json!({}));
        assert_eq!(
            normalize_metadata(json!({"a": 1})).unwrap(),
            json!({"a": 1})
        );
        assert!(matches!(
            normalize_metadata(json!("just a string")),
            Err(RabError::ValidationError(_))
        ));
    }
}
