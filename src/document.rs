//! YAML document access
//!
//! Turns raw YAML text into the flat list of mapping nodes the compiler
//! consumes, and provides typed field access with errors that name the
//! offending entity and key.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{CompilerError, Result};

/// Parse every YAML document in `text` and collect its mapping nodes.
///
/// A document may be a single mapping or a sequence of them; any other node
/// is skipped.
pub fn load_mappings(text: &str) -> Result<Vec<Mapping>> {
    let mut mappings = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        collect_mappings(value, &mut mappings);
    }
    Ok(mappings)
}

fn collect_mappings(value: Value, out: &mut Vec<Mapping>) {
    match value {
        Value::Mapping(mapping) => out.push(mapping),
        Value::Sequence(items) => {
            for item in items {
                match item {
                    Value::Mapping(mapping) => out.push(mapping),
                    other => debug!("Skipping non-mapping node: {:?}", other),
                }
            }
        }
        Value::Null => {}
        other => debug!("Skipping non-mapping document: {:?}", other),
    }
}

/// Typed view over one mapping node
pub struct Entry<'a> {
    mapping: &'a Mapping,
    entity: String,
}

impl<'a> Entry<'a> {
    pub fn new(mapping: &'a Mapping, kind: &str) -> Self {
        let entity = match mapping.get("name").and_then(scalar_text) {
            Some(name) => format!("{} `{}`", kind, name),
            None => kind.to_string(),
        };
        Self { mapping, entity }
    }

    /// Label used in error messages (e.g. "experiment `foo`")
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn has(&self, key: &str) -> bool {
        self.mapping.get(key).is_some()
    }

    fn required(&self, key: &str) -> Result<&'a Value> {
        self.mapping.get(key).ok_or_else(|| CompilerError::MissingField {
            entity: self.entity.clone(),
            field: key.to_string(),
        })
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> CompilerError {
        CompilerError::InvalidField {
            entity: self.entity.clone(),
            field: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Scalar field rendered as text; `null` reads as the empty string
    pub fn string(&self, key: &str) -> Result<String> {
        let value = self.required(key)?;
        if value.is_null() {
            return Ok(String::new());
        }
        scalar_text(value).ok_or_else(|| self.invalid(key, "expected a scalar"))
    }

    pub fn boolean(&self, key: &str) -> Result<bool> {
        self.required(key)?
            .as_bool()
            .ok_or_else(|| self.invalid(key, "expected a boolean"))
    }

    pub fn string_list(&self, key: &str) -> Result<Vec<String>> {
        let value = self.required(key)?;
        self.as_string_list(key, value)
    }

    /// Like [`Entry::string_list`] but absent or `null` yields an empty list
    pub fn optional_string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.mapping.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => self.as_string_list(key, value),
        }
    }

    fn as_string_list(&self, key: &str, value: &Value) -> Result<Vec<String>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(items) => items
                .iter()
                .map(|item| {
                    scalar_text(item).ok_or_else(|| self.invalid(key, "expected a list of scalars"))
                })
                .collect(),
            _ => Err(self.invalid(key, "expected a list")),
        }
    }

    pub fn string_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let value = self.required(key)?;
        let mapping = value
            .as_mapping()
            .ok_or_else(|| self.invalid(key, "expected a mapping"))?;
        mapping
            .iter()
            .map(|(k, v)| {
                let k = scalar_text(k).ok_or_else(|| self.invalid(key, "expected scalar keys"))?;
                let v = scalar_text(v).ok_or_else(|| self.invalid(key, "expected scalar values"))?;
                Ok((k, v))
            })
            .collect()
    }
}

/// Text form of a scalar node (`true`, `42` and strings alike)
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
