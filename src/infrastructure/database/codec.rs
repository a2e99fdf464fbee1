//! Type Converter
//!
//! Typed codecs between structured values and textual columns. Maps,
//! string arrays and objects that know their own textual form are stored as
//! JSON text; everything else passes through to the driver unchanged.
//! Repositories never call `serde_json` directly; they go through here.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::statement::Arg;

/// String to string mapping (notify props, job data, ...).
pub type StringMap = HashMap<String, String>;

/// String to arbitrary JSON value mapping (user and post props).
pub type StringInterface = HashMap<String, serde_json::Value>;

/// Ordered list of strings (post file ids, thread participants).
pub type StringArray = Vec<String>;

/// Objects that serialize themselves to a textual column.
pub trait ToJson {
    fn to_json(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The column holder was not textual.
    #[error("type mismatch: expected text, found {0}")]
    TypeMismatch(&'static str),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw value read from a column before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    Null,
}

impl ColumnValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Int(_) => "integer",
            Self::Null => "null",
        }
    }
}

/// Value handed to the converter on write.
pub enum DbValue<'a> {
    StringMap(&'a StringMap),
    StringInterface(&'a StringInterface),
    StringArray(&'a StringArray),
    Object(&'a dyn ToJson),
    /// Any other value; passed through unchanged.
    Plain(Arg),
}

/// Convert a value into the argument stored in its column.
pub fn to_db(value: DbValue<'_>) -> Result<Arg, CodecError> {
    Ok(match value {
        DbValue::StringMap(m) => Arg::Text(serde_json::to_string(m)?),
        DbValue::StringInterface(m) => Arg::Text(serde_json::to_string(m)?),
        DbValue::StringArray(a) => Arg::Text(serde_json::to_string(a)?),
        DbValue::Object(o) => Arg::Text(o.to_json()),
        DbValue::Plain(arg) => arg,
    })
}

/// Serialize any serde value to its JSON column text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Deserialize a textual column. NULL and empty text yield the default value;
/// a non-textual holder is a type mismatch.
pub fn decode<T>(holder: &ColumnValue) -> Result<T, CodecError>
where
    T: DeserializeOwned + Default,
{
    let text = match holder {
        ColumnValue::Null => return Ok(T::default()),
        ColumnValue::Text(s) => s.as_str(),
        ColumnValue::Bytes(b) => {
            std::str::from_utf8(b).map_err(|_| CodecError::TypeMismatch(holder.type_name()))?
        }
        ColumnValue::Int(_) => return Err(CodecError::TypeMismatch(holder.type_name())),
    };

    if text.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_string_map_round_trip() {
        let mut props = StringMap::new();
        props.insert("push".into(), "mention".into());
        props.insert("email".into(), "true".into());

        let arg = to_db(DbValue::StringMap(&props)).unwrap();
        let Arg::Text(text) = arg else {
            panic!("expected text argument");
        };
        let back: StringMap = decode(&ColumnValue::Text(text)).unwrap();
        assert_eq!(back, props);
    }

    #[test]
    fn test_string_interface_round_trip() {
        let mut props = StringInterface::new();
        props.insert("from_bot".into(), json!("true"));
        props.insert("attachments".into(), json!([{"title": "x"}]));

        let text = encode(&props).unwrap();
        let back: StringInterface = decode(&ColumnValue::Bytes(text.into_bytes())).unwrap();
        assert_eq!(back, props);
    }

    #[test]
    fn test_string_array_keeps_order() {
        let ids: StringArray = vec!["b".into(), "a".into(), "c".into()];
        let text = encode(&ids).unwrap();
        assert_eq!(text, r#"["b","a","c"]"#);
        let back: StringArray = decode(&ColumnValue::Text(text)).unwrap();
        assert_eq!(back, ids);
    }

    #[test]
    fn test_object_uses_its_textual_form() {
        struct Marker;
        impl ToJson for Marker {
            fn to_json(&self) -> String {
                "{\"marker\":true}".into()
            }
        }
        assert_eq!(
            to_db(DbValue::Object(&Marker)).unwrap(),
            Arg::Text("{\"marker\":true}".into())
        );
    }

    #[test]
    fn test_plain_passes_through() {
        assert_eq!(to_db(DbValue::Plain(Arg::Int(7))).unwrap(), Arg::Int(7));
    }

    #[test]
    fn test_null_and_empty_yield_default() {
        let m: StringMap = decode(&ColumnValue::Null).unwrap();
        assert!(m.is_empty());
        let a: StringArray = decode(&ColumnValue::Text(String::new())).unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn test_non_text_holder_is_type_mismatch() {
        let err = decode::<StringMap>(&ColumnValue::Int(3)).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch("integer")));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = decode::<StringMap>(&ColumnValue::Text("{not json".into())).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }
}
