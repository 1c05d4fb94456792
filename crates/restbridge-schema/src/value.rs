//! Structured property values exchanged with the declarative engine.
//!
//! A [`PropertyValue`] is plain JSON extended with three wrapper kinds: secrets,
//! computed (not yet known) placeholders, and resolved outputs. Equality used for
//! diffing looks through the wrappers; the HTTP-facing form drops them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Key marking a signature-tagged envelope in the wire format.
pub const SIGNATURE_KEY: &str = "4dabf18193072939515e22adb298388d";
/// Signature of a secret envelope.
pub const SECRET_SIGNATURE: &str = "1b47061264138c4ac30d75fd1eb44270";
/// Signature of a resolved output envelope.
pub const OUTPUT_SIGNATURE: &str = "d0e6a833031e9bbcd3f4e8bde6ca49a4";
/// Sentinel string standing in for a value that is not known yet.
pub const UNKNOWN_SENTINEL: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Name-keyed set of property values. Ordering carries no meaning.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Object(PropertyMap),
    Secret(Box<PropertyValue>),
    Computed,
    Output(Box<PropertyValue>),
}

impl PropertyValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn secret(inner: PropertyValue) -> Self {
        Self::Secret(Box::new(inner))
    }

    pub fn output(inner: PropertyValue) -> Self {
        Self::Output(Box::new(inner))
    }

    /// Peel every secret/output wrapper and return the underlying element.
    pub fn unwrapped(&self) -> &PropertyValue {
        let mut current = self;
        loop {
            match current {
                Self::Secret(inner) | Self::Output(inner) => current = &**inner,
                other => return other,
            }
        }
    }

    pub fn unwrapped_mut(&mut self) -> &mut PropertyValue {
        match self {
            Self::Secret(inner) | Self::Output(inner) => inner.unwrapped_mut(),
            other => other,
        }
    }

    pub fn is_secret(&self) -> bool {
        match self {
            Self::Secret(_) => true,
            Self::Output(inner) => inner.is_secret(),
            _ => false,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.unwrapped(), Self::Computed)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unwrapped(), Self::Null)
    }

    /// Whether the value carries meaning for diffing. Null is treated as absent.
    pub fn has_value(&self) -> bool {
        !self.is_null()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrapped() {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PropertyMap> {
        match self.unwrapped() {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut PropertyMap> {
        match self.unwrapped_mut() {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PropertyValue]> {
        match self.unwrapped() {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Structural equality that looks through secret/output wrappers at every depth.
    pub fn deep_eq(&self, other: &PropertyValue) -> bool {
        match (self.unwrapped(), other.unwrapped()) {
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
            }
            (Self::Object(a), Self::Object(b)) => maps_deep_eq(a, b),
            (a, b) => a == b,
        }
    }

    /// Render a scalar as the text used in URL path segments.
    ///
    /// Integral numbers print without a fractional part, so `42` and `42.0`
    /// both become `"42"`. Returns `None` for null, computed, and compound values.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self.unwrapped() {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Convert to the JSON sent over HTTP: wrappers removed, secrets revealed,
    /// unknown values rendered as null.
    pub fn to_plain_json(&self) -> Value {
        match self {
            Self::Null | Self::Computed => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_plain_json).collect()),
            Self::Object(map) => Value::Object(map_to_plain_json(map)),
            Self::Secret(inner) | Self::Output(inner) => inner.to_plain_json(),
        }
    }

    /// Convert to the engine's wire format, keeping wrapper envelopes.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Computed => Value::String(UNKNOWN_SENTINEL.to_owned()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_wire).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect(),
            ),
            Self::Secret(inner) => envelope(SECRET_SIGNATURE, Some(inner.to_wire())),
            Self::Output(inner) => envelope(OUTPUT_SIGNATURE, Some(inner.to_wire())),
        }
    }

    /// Decode the engine's wire format.
    pub fn from_wire(value: Value) -> Self {
        match value {
            Value::String(s) if s == UNKNOWN_SENTINEL => Self::Computed,
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from_wire).collect()),
            Value::Object(mut map) => {
                let signature = map
                    .get(SIGNATURE_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                match signature.as_deref() {
                    Some(SECRET_SIGNATURE) => {
                        let inner = map.remove("value").unwrap_or(Value::Null);
                        Self::secret(Self::from_wire(inner))
                    }
                    Some(OUTPUT_SIGNATURE) => {
                        let secret = map.get("secret").and_then(Value::as_bool).unwrap_or(false);
                        let decoded = match map.remove("value") {
                            Some(inner) => Self::output(Self::from_wire(inner)),
                            None => Self::Computed,
                        };
                        if secret {
                            Self::secret(decoded)
                        } else {
                            decoded
                        }
                    }
                    _ => Self::Object(
                        map.into_iter()
                            .map(|(k, v)| (k, Self::from_wire(v)))
                            .collect(),
                    ),
                }
            }
            plain => Self::from(plain),
        }
    }
}

impl From<Value> for PropertyValue {
    /// Plain JSON conversion: no signature envelopes are interpreted.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        Self::Object(map)
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_wire)
    }
}

/// Convert a plain JSON object into a property map. Non-objects yield `None`.
pub fn map_from_json(value: Value) -> Option<PropertyMap> {
    match PropertyValue::from(value) {
        PropertyValue::Object(map) => Some(map),
        _ => None,
    }
}

/// Convert a property map into the JSON object sent over HTTP.
pub fn map_to_plain_json(map: &PropertyMap) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), v.to_plain_json()))
        .collect()
}

/// Structural map equality through wrappers; null entries count as absent.
pub fn maps_deep_eq(a: &PropertyMap, b: &PropertyMap) -> bool {
    let present = |m: &PropertyMap| m.iter().filter(|(_, v)| v.has_value()).count();
    if present(a) != present(b) {
        return false;
    }
    a.iter()
        .filter(|(_, v)| v.has_value())
        .all(|(k, v)| b.get(k).is_some_and(|other| v.deep_eq(other)))
}

fn envelope(signature: &str, value: Option<Value>) -> Value {
    let mut map = Map::new();
    map.insert(
        SIGNATURE_KEY.to_owned(),
        Value::String(signature.to_owned()),
    );
    if let Some(value) = value {
        map.insert("value".to_owned(), value);
    }
    Value::Object(map)
}

// i64 bounds as f64; integral values inside this range print without a fraction.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&n)
}

fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> Value {
    if is_integral(n) {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}
