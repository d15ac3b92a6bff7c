//! Typed token claims and role extraction

use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Leaf value inside a claim body
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// Any value found in a claim body
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Scalar(Scalar),
    Map(Claims),
    List(Vec<ClaimValue>),
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ClaimValue::Scalar(Scalar::String(s)),
            Value::Number(n) => ClaimValue::Scalar(Scalar::Number(n)),
            Value::Bool(b) => ClaimValue::Scalar(Scalar::Bool(b)),
            Value::Null => ClaimValue::Scalar(Scalar::Null),
            Value::Array(items) => ClaimValue::List(items.into_iter().map(ClaimValue::from).collect()),
            Value::Object(map) => ClaimValue::Map(Claims::from(map)),
        }
    }
}

impl ClaimValue {
    /// The string inside a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The nested mapping, if this value is one
    pub fn as_map(&self) -> Option<&Claims> {
        match self {
            ClaimValue::Map(claims) => Some(claims),
            _ => None,
        }
    }

    /// The list items, if this value is a list
    pub fn as_list(&self) -> Option<&[ClaimValue]> {
        match self {
            ClaimValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Decoded body of a verified token
///
/// Deserializes from any JSON object; anything else is rejected, which the
/// verifier reports as malformed claims.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Claims(map.into_iter().map(|(k, v)| (k, ClaimValue::from(v))).collect())
    }
}

impl TryFrom<Value> for Claims {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Claims::from(map)),
            other => Err(format!(
                "claims must be a JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Claims {
    /// Look up a top-level claim
    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.0.get(key)
    }

    /// Subject of the token, when present as a string
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(ClaimValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Roles found at `dotted_path`, see [`extract_roles`]
    pub fn roles_at(&self, dotted_path: &str) -> Vec<String> {
        extract_roles(self, dotted_path)
    }
}

/// Collect role names from the list found at `dotted_path`
///
/// Every segment but the last must name a nested mapping; the last must name
/// a list. Non-string list items are skipped. Any other shape, a missing key
/// or an empty path yields no roles.
pub fn extract_roles(claims: &Claims, dotted_path: &str) -> Vec<String> {
    if dotted_path.is_empty() {
        tracing::debug!("Empty role claim path, no roles extracted");
        return Vec::new();
    }

    let segments: Vec<&str> = dotted_path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Vec::new(),
    };

    let mut current = claims;
    for segment in parents {
        match current.get(segment) {
            Some(ClaimValue::Map(nested)) => current = nested,
            Some(_) => {
                tracing::debug!(segment, "Role claim segment is not a mapping");
                return Vec::new();
            }
            None => {
                tracing::debug!(segment, "Role claim segment not found");
                return Vec::new();
            }
        }
    }

    let Some(items) = current.get(last).and_then(ClaimValue::as_list) else {
        tracing::debug!(segment = *last, "Role claim is missing or not a list");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let role = item.as_str();
            if role.is_none() {
                tracing::trace!(?item, "Skipping non-string role entry");
            }
            role.map(str::to_string)
        })
        .collect()
}
