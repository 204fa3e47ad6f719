use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::storage_class::StorageClass;
use crate::error::SchemaGenError;

/// JSON object key marking a base64-encoded binary value: `{"$blob": "AAE="}`.
pub const BLOB_KEY: &str = "$blob";

/// A single scalar carried by a request or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Null,
}

/// Field name -> value, in request order.
pub type FieldMap = IndexMap<String, FieldValue>;

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn storage_class(&self) -> StorageClass {
        StorageClass::infer(self)
    }

    /// Decodes one JSON value. Booleans become 0/1; whole numbers that overflow i64 become real.
    pub fn from_json(field: &str, value: &Value) -> Result<Self, SchemaGenError> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Integer(i64::from(*b))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(FieldValue::Integer(i)),
                None => n.as_f64().map(FieldValue::Real).ok_or_else(|| {
                    SchemaGenError::UnsupportedValue {
                        field: field.to_string(),
                        reason: format!("number {n} is not representable"),
                    }
                }),
            },
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Object(obj) => decode_blob(field, obj),
            Value::Array(_) => Err(SchemaGenError::UnsupportedValue {
                field: field.to_string(),
                reason: "arrays are not scalar".to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Real(r) => Number::from_f64(*r).map_or(Value::Null, Value::Number),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Blob(b) => {
                let mut obj = Map::new();
                obj.insert(BLOB_KEY.to_string(), Value::String(STANDARD.encode(b)));
                Value::Object(obj)
            }
            FieldValue::Null => Value::Null,
        }
    }

    /// Converts the value for storage in a column of `class`.
    ///
    /// Only a blob headed for a text column changes: it is stringified as lossy UTF-8, which
    /// matches what `CAST(x AS TEXT)` does to existing blobs during a rebuild. Numbers are left
    /// to the column's affinity.
    pub fn coerce_for(self, class: StorageClass) -> Self {
        match (self, class) {
            (FieldValue::Blob(b), StorageClass::Text) => {
                FieldValue::Text(String::from_utf8_lossy(&b).into_owned())
            }
            (value, _) => value,
        }
    }
}

fn decode_blob(field: &str, obj: &Map<String, Value>) -> Result<FieldValue, SchemaGenError> {
    let unsupported = |reason: &str| SchemaGenError::UnsupportedValue {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    match (obj.len(), obj.get(BLOB_KEY)) {
        (1, Some(Value::String(encoded))) => STANDARD
            .decode(encoded)
            .map(FieldValue::Blob)
            .map_err(|e| unsupported(&format!("invalid base64 blob: {e}"))),
        (1, Some(_)) => Err(unsupported("blob payload must be a base64 string")),
        _ => Err(unsupported("nested objects are not scalar")),
    }
}

/// Decodes a JSON object into an ordered field map.
pub fn fields_from_json(obj: &Map<String, Value>) -> Result<FieldMap, SchemaGenError> {
    obj.iter()
        .map(|(name, value)| FieldValue::from_json(name, value).map(|v| (name.clone(), v)))
        .collect()
}

pub fn fields_to_json(fields: &FieldMap) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_decode_to_tagged_values() {
        assert_eq!(FieldValue::from_json("a", &json!(30)).unwrap(), FieldValue::Integer(30));
        assert_eq!(FieldValue::from_json("a", &json!(30.5)).unwrap(), FieldValue::Real(30.5));
        assert_eq!(FieldValue::from_json("a", &json!(true)).unwrap(), FieldValue::Integer(1));
        assert_eq!(
            FieldValue::from_json("a", &json!("Ada")).unwrap(),
            FieldValue::Text("Ada".into())
        );
        assert_eq!(FieldValue::from_json("a", &Value::Null).unwrap(), FieldValue::Null);
    }

    #[test]
    fn oversized_whole_number_becomes_real() {
        let v = FieldValue::from_json("a", &json!(u64::MAX)).unwrap();
        assert!(matches!(v, FieldValue::Real(_)));
    }

    #[test]
    fn blob_object_decodes_base64() {
        let v = FieldValue::from_json("a", &json!({ "$blob": "AAEC" })).unwrap();
        assert_eq!(v, FieldValue::Blob(vec![0, 1, 2]));
        assert_eq!(v.to_json(), json!({ "$blob": "AAEC" }));
    }

    #[test]
    fn non_scalars_are_rejected() {
        for bad in [
            json!([1, 2]),
            json!({ "nested": 1 }),
            json!({ "$blob": 5 }),
            json!({ "$blob": "not base64!" }),
            json!({ "$blob": "AAEC", "extra": 1 }),
        ] {
            let err = FieldValue::from_json("payload", &bad).unwrap_err();
            assert!(
                matches!(err, SchemaGenError::UnsupportedValue { ref field, .. } if field == "payload"),
                "{bad} -> {err:?}"
            );
        }
    }

    #[test]
    fn blob_into_text_column_is_stringified() {
        let v = FieldValue::Blob(b"hi".to_vec()).coerce_for(StorageClass::Text);
        assert_eq!(v, FieldValue::Text("hi".into()));

        let v = FieldValue::Integer(3).coerce_for(StorageClass::Text);
        assert_eq!(v, FieldValue::Integer(3));
    }

    #[test]
    fn field_map_keeps_request_order() {
        let obj = json!({ "name": "Ada", "age": 30, "nick": null });
        let fields = fields_from_json(obj.as_object().unwrap()).unwrap();
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["name", "age", "nick"]);
    }
}
