// src/zkp/transform.rs
//! Canonical schema transformer.
//!
//! Turns an attribute document into the ordered sequence of field elements
//! that is hashed and signed. The document is first zipped with its
//! transform schema into a [`ShapedDocument`], which is where every shape
//! mismatch is detected; linearization then walks the shaped document in
//! ascending key order and runs each leaf's step pipeline.
//!
//! The result is a pure function of `(attributes, schema)`: key order in
//! the input never affects the output.
//!
//! # Example
//! ```text
//! attributes: { "name": "John", "age": 30 }
//! schema:     { "name": ["utf8-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"],
//!               "age":  ["uint64-mina:field"] }
//! output:     [ field(30), field("John") ]      // "age" < "name"
//! ```

use crate::models::schema::{display_path, Shaped, TrSchema};
use crate::zkp::field::{field_from_uint, field_mod_order, modulus, Field};
use crate::zkp::signature::{PublicKey, Signature};
use chrono::DateTime;
use num_bigint::BigUint;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds between 1900-01-01T00:00:00Z and the Unix epoch.
const UNIXTIME19_OFFSET_MS: i64 = 2_208_988_800_000;

/// Fatal linearization failure. Never coerced or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("attribute missing at '{path}'")]
    MissingAttribute { path: String },
    #[error("attribute at '{path}' has no transform schema")]
    MissingSchema { path: String },
    #[error("shape mismatch at '{path}': schema expects {expected}")]
    ShapeMismatch { path: String, expected: &'static str },
    #[error("unknown transform step '{step}' at '{path}'")]
    UnknownStep { path: String, step: String },
    #[error("unsupported attribute value at '{path}'")]
    UnsupportedValue { path: String },
    #[error("step '{step}' failed at '{path}': {reason}")]
    Step {
        path: String,
        step: Step,
        reason: String,
    },
    #[error("transform at '{path}' produced {produced}, expected field elements")]
    NotField { path: String, produced: &'static str },
}

/// A single-purpose converter in a leaf's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    AsciiBytes,
    Utf8Bytes,
    Base58Bytes,
    HexBytes,
    BytesUint,
    BytesUint16,
    BytesUint32,
    BytesUint64,
    BytesUint128,
    UintBytes,
    Uint256Bytes,
    BytesBase58,
    ModOrder,
    UintField,
    Uint16Field,
    Uint32Field,
    Uint64Field,
    Uint128Field,
    IsoDateUnixtime,
    UnixtimeUint64,
    IsoDateUnixtime19,
    Unixtime19Uint64,
    BooleanUint,
    Base58PublicKey,
    PublicKeyFields,
    Base58Signature,
}

impl Step {
    pub const ALL: [Step; 26] = [
        Step::AsciiBytes,
        Step::Utf8Bytes,
        Step::Base58Bytes,
        Step::HexBytes,
        Step::BytesUint,
        Step::BytesUint16,
        Step::BytesUint32,
        Step::BytesUint64,
        Step::BytesUint128,
        Step::UintBytes,
        Step::Uint256Bytes,
        Step::BytesBase58,
        Step::ModOrder,
        Step::UintField,
        Step::Uint16Field,
        Step::Uint32Field,
        Step::Uint64Field,
        Step::Uint128Field,
        Step::IsoDateUnixtime,
        Step::UnixtimeUint64,
        Step::IsoDateUnixtime19,
        Step::Unixtime19Uint64,
        Step::BooleanUint,
        Step::Base58PublicKey,
        Step::PublicKeyFields,
        Step::Base58Signature,
    ];

    /// Wire name of the step.
    pub fn name(&self) -> &'static str {
        match self {
            Step::AsciiBytes => "ascii-bytes",
            Step::Utf8Bytes => "utf8-bytes",
            Step::Base58Bytes => "base58-bytes",
            Step::HexBytes => "hex-bytes",
            Step::BytesUint => "bytes-uint",
            Step::BytesUint16 => "bytes-uint16",
            Step::BytesUint32 => "bytes-uint32",
            Step::BytesUint64 => "bytes-uint64",
            Step::BytesUint128 => "bytes-uint128",
            Step::UintBytes => "uint-bytes",
            Step::Uint256Bytes => "uint256-bytes",
            Step::BytesBase58 => "bytes-base58",
            Step::ModOrder => "mina:mod.order",
            Step::UintField => "uint-mina:field",
            Step::Uint16Field => "uint16-mina:field",
            Step::Uint32Field => "uint32-mina:field",
            Step::Uint64Field => "uint64-mina:field",
            Step::Uint128Field => "uint128-mina:field",
            Step::IsoDateUnixtime => "isodate-unixtime",
            Step::UnixtimeUint64 => "unixtime-uint64",
            Step::IsoDateUnixtime19 => "isodate-unixtime19",
            Step::Unixtime19Uint64 => "unixtime19-uint64",
            Step::BooleanUint => "boolean-uint",
            Step::Base58PublicKey => "base58-mina:publickey",
            Step::PublicKeyFields => "mina:publickey-mina:fields",
            Step::Base58Signature => "base58-mina:signature",
        }
    }

    /// Runs the step on one intermediate value.
    pub fn apply(self, input: TrValue) -> Result<TrValue, String> {
        match (self, input) {
            (Step::AsciiBytes, TrValue::Str(s)) => {
                if s.is_ascii() {
                    Ok(TrValue::Bytes(s.into_bytes()))
                } else {
                    Err("string contains non-ascii characters".into())
                }
            }
            (Step::Utf8Bytes, TrValue::Str(s)) => Ok(TrValue::Bytes(s.into_bytes())),
            (Step::Base58Bytes, TrValue::Str(s)) => bs58::decode(&s)
                .into_vec()
                .map(TrValue::Bytes)
                .map_err(|e| e.to_string()),
            (Step::HexBytes, TrValue::Str(s)) => {
                let digits = s.strip_prefix("0x").unwrap_or(&s);
                hex::decode(digits)
                    .map(TrValue::Bytes)
                    .map_err(|e| e.to_string())
            }
            (Step::BytesUint, TrValue::Bytes(bytes)) => {
                Ok(TrValue::Uint(BigUint::from_bytes_be(&bytes)))
            }
            (Step::BytesUint16, TrValue::Bytes(bytes)) => bytes_to_bounded_uint(&bytes, 16),
            (Step::BytesUint32, TrValue::Bytes(bytes)) => bytes_to_bounded_uint(&bytes, 32),
            (Step::BytesUint64, TrValue::Bytes(bytes)) => bytes_to_bounded_uint(&bytes, 64),
            (Step::BytesUint128, TrValue::Bytes(bytes)) => bytes_to_bounded_uint(&bytes, 128),
            (Step::UintBytes, TrValue::Uint(value)) => Ok(TrValue::Bytes(value.to_bytes_be())),
            (Step::Uint256Bytes, TrValue::Uint(value)) => {
                if value.bits() > 256 {
                    return Err("value does not fit in 256 bits".into());
                }
                let bytes = value.to_bytes_be();
                let mut padded = vec![0u8; 32 - bytes.len()];
                padded.extend(bytes);
                Ok(TrValue::Bytes(padded))
            }
            (Step::BytesBase58, TrValue::Bytes(bytes)) => {
                Ok(TrValue::Str(bs58::encode(bytes).into_string()))
            }
            (Step::ModOrder, TrValue::Uint(value)) => Ok(TrValue::Uint(value % modulus())),
            (Step::UintField, TrValue::Uint(value)) => field_from_uint(&value)
                .map(TrValue::Field)
                .ok_or_else(|| "value exceeds the field modulus".to_string()),
            (Step::Uint16Field, TrValue::Uint(value)) => bounded_uint_to_field(&value, 16),
            (Step::Uint32Field, TrValue::Uint(value)) => bounded_uint_to_field(&value, 32),
            (Step::Uint64Field, TrValue::Uint(value)) => bounded_uint_to_field(&value, 64),
            (Step::Uint128Field, TrValue::Uint(value)) => bounded_uint_to_field(&value, 128),
            (Step::IsoDateUnixtime, TrValue::Str(s)) => parse_isodate(&s).map(TrValue::Int),
            (Step::IsoDateUnixtime19, TrValue::Str(s)) => {
                parse_isodate(&s).map(|ms| TrValue::Int(ms + UNIXTIME19_OFFSET_MS))
            }
            (Step::UnixtimeUint64 | Step::Unixtime19Uint64, TrValue::Int(ms)) => u64::try_from(ms)
                .map(|ms| TrValue::Uint(BigUint::from(ms)))
                .map_err(|_| "timestamp is before the representable range".to_string()),
            (Step::BooleanUint, TrValue::Bool(b)) => Ok(TrValue::Uint(BigUint::from(b as u8))),
            (Step::Base58PublicKey, TrValue::Str(s)) => PublicKey::from_base58(&s)
                .map(TrValue::PublicKey)
                .map_err(|e| e.to_string()),
            (Step::PublicKeyFields, TrValue::PublicKey(key)) => {
                Ok(TrValue::Fields(key.to_fields().to_vec()))
            }
            (Step::Base58Signature, TrValue::Str(s)) => Signature::from_base58(&s)
                .map(TrValue::Signature)
                .map_err(|e| e.to_string()),
            (_, other) => Err(format!("cannot be applied to {}", other.kind())),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

fn bytes_to_bounded_uint(bytes: &[u8], bits: u64) -> Result<TrValue, String> {
    let value = BigUint::from_bytes_be(bytes);
    if value.bits() > bits {
        return Err(format!("{} bytes do not fit in {} bits", bytes.len(), bits));
    }
    Ok(TrValue::Uint(value))
}

fn bounded_uint_to_field(value: &BigUint, bits: u64) -> Result<TrValue, String> {
    if value.bits() > bits {
        return Err(format!("value does not fit in {} bits", bits));
    }
    Ok(TrValue::Field(field_mod_order(value)))
}

fn parse_isodate(s: &str) -> Result<i64, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|date| date.timestamp_millis())
        .map_err(|e| format!("invalid ISO date-time: {}", e))
}

/// Intermediate value flowing between steps.
#[derive(Debug, Clone, PartialEq)]
pub enum TrValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Bytes(Vec<u8>),
    Uint(BigUint),
    Field(Field),
    Fields(Vec<Field>),
    PublicKey(PublicKey),
    Signature(Signature),
}

impl TrValue {
    fn kind(&self) -> &'static str {
        match self {
            TrValue::Str(_) => "string",
            TrValue::Bool(_) => "boolean",
            TrValue::Int(_) => "timestamp",
            TrValue::Bytes(_) => "bytes",
            TrValue::Uint(_) => "unsigned integer",
            TrValue::Field(_) => "field element",
            TrValue::Fields(_) => "field elements",
            TrValue::PublicKey(_) => "public key",
            TrValue::Signature(_) => "signature",
        }
    }

    /// Reads an attribute leaf. Only strings, booleans and unsigned
    /// integers are scalars of the attribute document.
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(TrValue::Str(s.clone())),
            Value::Bool(b) => Some(TrValue::Bool(*b)),
            Value::Number(n) => n.as_u64().map(|n| TrValue::Uint(BigUint::from(n))),
            _ => None,
        }
    }
}

/// Applies a step pipeline to a single value.
pub fn transform_value(input: TrValue, steps: &[Step]) -> Result<TrValue, TransformError> {
    apply_steps(input, steps, &[])
}

fn apply_steps(input: TrValue, steps: &[Step], path: &[String]) -> Result<TrValue, TransformError> {
    steps.iter().try_fold(input, |value, step| {
        step.apply(value).map_err(|reason| TransformError::Step {
            path: display_path(path),
            step: *step,
            reason,
        })
    })
}

/// Parses wire step names.
pub fn parse_steps(names: &[String], path: &[String]) -> Result<Vec<Step>, TransformError> {
    names
        .iter()
        .map(|name| {
            name.parse::<Step>().map_err(|step| TransformError::UnknownStep {
                path: display_path(path),
                step,
            })
        })
        .collect()
}

/// Attribute leaf paired with the steps that encode it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedLeaf<'a> {
    pub value: &'a Value,
    pub steps: Vec<Step>,
}

/// Attribute document and transform schema fused into one tree. Once built,
/// every leaf has both a value and a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedDocument<'a>(Shaped<ShapedLeaf<'a>>);

impl<'a> ShapedDocument<'a> {
    /// Zips a document with its schema, failing on the first path present
    /// in one and absent from the other.
    pub fn zip(document: &'a Value, schema: &TrSchema) -> Result<Self, TransformError> {
        zip_node(document, schema, &mut Vec::new()).map(ShapedDocument)
    }

    /// Runs every leaf pipeline in canonical order and concatenates the output.
    pub fn linearize(&self) -> Result<Vec<Field>, TransformError> {
        let mut linear = Vec::new();
        for (path, leaf) in self.0.leaves() {
            let input = TrValue::from_json(leaf.value).ok_or_else(|| {
                TransformError::UnsupportedValue {
                    path: display_path(&path),
                }
            })?;
            match apply_steps(input, &leaf.steps, &path)? {
                TrValue::Field(field) => linear.push(field),
                TrValue::Fields(fields) => linear.extend(fields),
                other => {
                    return Err(TransformError::NotField {
                        path: display_path(&path),
                        produced: other.kind(),
                    })
                }
            }
        }
        Ok(linear)
    }
}

fn zip_node<'a>(
    document: &'a Value,
    schema: &TrSchema,
    path: &mut Vec<String>,
) -> Result<Shaped<ShapedLeaf<'a>>, TransformError> {
    match schema {
        Shaped::Leaf(names) => {
            if document.is_object() || document.is_array() {
                return Err(TransformError::ShapeMismatch {
                    path: display_path(path),
                    expected: "a scalar value",
                });
            }
            Ok(Shaped::Leaf(ShapedLeaf {
                value: document,
                steps: parse_steps(names, path)?,
            }))
        }
        Shaped::Node(children) => {
            let object = document.as_object().ok_or_else(|| TransformError::ShapeMismatch {
                path: display_path(path),
                expected: "an object",
            })?;
            if let Some(key) = object.keys().find(|key| !children.contains_key(*key)) {
                path.push(key.clone());
                let err = TransformError::MissingSchema {
                    path: display_path(path),
                };
                path.pop();
                return Err(err);
            }
            let mut zipped = Shaped::node();
            for (key, child_schema) in children {
                path.push(key.clone());
                let child = match object.get(key) {
                    Some(child) => zip_node(child, child_schema, path)?,
                    None => {
                        return Err(TransformError::MissingAttribute {
                            path: display_path(path),
                        })
                    }
                };
                path.pop();
                zipped = zipped.with(key.clone(), child);
            }
            Ok(zipped)
        }
    }
}

/// Linearizes a document against a schema.
pub fn linearize(document: &Value, schema: &TrSchema) -> Result<Vec<Field>, TransformError> {
    ShapedDocument::zip(document, schema)?.linearize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::fixtures::{passport_attributes, passport_schema};
    use crate::zkp::signature::PrivateKey;
    use serde_json::json;

    const STRING_FIELD: [&str; 4] = ["utf8-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"];

    #[test]
    fn test_linearize_orders_by_key() {
        let document = json!({ "name": "John", "age": 30 });
        let schema: TrSchema = serde_json::from_value(json!({
            "name": STRING_FIELD,
            "age": ["uint64-mina:field"]
        }))
        .unwrap();

        let linear = linearize(&document, &schema).unwrap();
        assert_eq!(linear.len(), 2);
        assert_eq!(linear[0], Field::from(30u64));
        assert_eq!(linear[1], Field::from(0x4a6f686eu64)); // "John"
    }

    #[test]
    fn test_linearize_is_deterministic_and_order_independent() {
        let attributes = passport_attributes();
        let schema = passport_schema();
        let document = attributes.to_document();

        let first = linearize(&document, &schema).unwrap();
        let second = linearize(&document, &schema).unwrap();
        assert_eq!(first, second);

        let reordered: Value = serde_json::from_str(
            r#"{"subject":{"gender":"male","birthDate":"1995-01-01T00:00:00.000Z","lastName":"Smith",
                "firstName":"John","id":{"key":"0x5bd3a1e95c3d5b362fa9bbbbd541aa93f38ec3c0","type":"ethereum:address"}},
                "document":{"sybilId":"zqvg9dLUQLpTPCXanojTPRhaFhZ","id":"test-passport:123456"},
                "countryCode":"GBR","validUntil":"2029-12-30T21:00:00.000Z","validFrom":"2015-01-01T00:00:00.000Z",
                "issuanceDate":"2024-02-26T14:13:12.174Z","type":"passport"}"#,
        )
        .unwrap();
        assert_eq!(linearize(&reordered, &schema).unwrap(), first);
    }

    #[test]
    fn test_schema_missing_key_fails() {
        let document = passport_attributes().to_document();
        let mut schema = passport_schema();
        schema.remove(&["subject", "gender"]).unwrap();

        let err = linearize(&document, &schema).unwrap_err();
        assert_eq!(
            err,
            TransformError::MissingSchema {
                path: "subject.gender".into()
            }
        );
    }

    #[test]
    fn test_attribute_missing_key_fails() {
        let mut document = passport_attributes().to_document();
        document["document"].as_object_mut().unwrap().remove("sybilId");

        let err = linearize(&document, &passport_schema()).unwrap_err();
        assert_eq!(
            err,
            TransformError::MissingAttribute {
                path: "document.sybilId".into()
            }
        );
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let document = json!({ "subject": "flat" });
        let schema: TrSchema =
            serde_json::from_value(json!({ "subject": { "name": STRING_FIELD } })).unwrap();
        assert!(matches!(
            linearize(&document, &schema),
            Err(TransformError::ShapeMismatch { expected: "an object", .. })
        ));

        let document = json!({ "subject": { "name": "x" } });
        let schema: TrSchema = serde_json::from_value(json!({ "subject": STRING_FIELD })).unwrap();
        assert!(matches!(
            linearize(&document, &schema),
            Err(TransformError::ShapeMismatch { expected: "a scalar value", .. })
        ));
    }

    #[test]
    fn test_unknown_step_fails() {
        let document = json!({ "code": "GBR" });
        let schema: TrSchema =
            serde_json::from_value(json!({ "code": ["iso3166alpha3-iso3166numeric"] })).unwrap();
        assert_eq!(
            linearize(&document, &schema).unwrap_err(),
            TransformError::UnknownStep {
                path: "code".into(),
                step: "iso3166alpha3-iso3166numeric".into()
            }
        );
    }

    #[test]
    fn test_step_domain_errors() {
        let schema: TrSchema = serde_json::from_value(json!({
            "gender": ["ascii-bytes", "bytes-uint64", "uint64-mina:field"]
        }))
        .unwrap();
        let err = linearize(&json!({ "gender": "non-binary" }), &schema).unwrap_err();
        assert!(matches!(err, TransformError::Step { step: Step::BytesUint64, .. }));

        let err = linearize(&json!({ "gender": "mâle" }), &schema).unwrap_err();
        assert!(matches!(err, TransformError::Step { step: Step::AsciiBytes, .. }));

        let strict: TrSchema = serde_json::from_value(json!({
            "blob": ["utf8-bytes", "bytes-uint", "uint-mina:field"]
        }))
        .unwrap();
        let long = "x".repeat(40);
        let err = linearize(&json!({ "blob": long }), &strict).unwrap_err();
        assert!(matches!(err, TransformError::Step { step: Step::UintField, .. }));

        let reduced: TrSchema = serde_json::from_value(json!({ "blob": STRING_FIELD })).unwrap();
        assert!(linearize(&json!({ "blob": "x".repeat(40) }), &reduced).is_ok());
    }

    #[test]
    fn test_pipeline_must_end_in_field() {
        let schema: TrSchema = serde_json::from_value(json!({ "name": ["utf8-bytes"] })).unwrap();
        assert_eq!(
            linearize(&json!({ "name": "John" }), &schema).unwrap_err(),
            TransformError::NotField {
                path: "name".into(),
                produced: "bytes"
            }
        );
    }

    #[test]
    fn test_dates_and_public_keys() {
        let key = PrivateKey::generate(&mut rand::thread_rng()).public_key();
        let document = json!({
            "born": "1950-01-01T00:00:00.000Z",
            "issued": "1970-01-01T00:00:01.000Z",
            "owner": key.to_base58(),
        });
        let schema: TrSchema = serde_json::from_value(json!({
            "born": ["isodate-unixtime19", "unixtime19-uint64", "uint64-mina:field"],
            "issued": ["isodate-unixtime", "unixtime-uint64", "uint64-mina:field"],
            "owner": ["base58-mina:publickey", "mina:publickey-mina:fields"],
        }))
        .unwrap();

        let linear = linearize(&document, &schema).unwrap();
        assert_eq!(linear.len(), 4);
        assert_eq!(linear[0], Field::from((UNIXTIME19_OFFSET_MS - 631_152_000_000) as u64));
        assert_eq!(linear[1], Field::from(1000u64));
        assert_eq!(&linear[2..], &key.to_fields());

        let pre_epoch: TrSchema = serde_json::from_value(json!({
            "born": ["isodate-unixtime", "unixtime-uint64", "uint64-mina:field"]
        }))
        .unwrap();
        assert!(linearize(&json!({ "born": "1950-01-01T00:00:00.000Z" }), &pre_epoch).is_err());
    }

    #[test]
    fn test_transform_value_base58_commitment() {
        let out = transform_value(
            TrValue::Uint(BigUint::from(1u8)),
            &[Step::Uint256Bytes, Step::BytesBase58],
        )
        .unwrap();
        let mut expected = vec![0u8; 31];
        expected.push(1);
        assert_eq!(out, TrValue::Str(bs58::encode(expected).into_string()));
    }

    #[test]
    fn test_step_names_round_trip() {
        for step in Step::ALL {
            assert_eq!(step.name().parse::<Step>().unwrap(), step);
        }
    }
}
