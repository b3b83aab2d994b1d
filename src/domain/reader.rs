//! Path-tracking accessors over untyped JSON.
//!
//! Every accessor either yields a typed value or a [`ValidationError`] that names
//! the exact field path (`[2].payload.issue.number`). Nothing here panics.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::validate::ValidationError;

/// A JSON value together with the path it was reached by.
#[derive(Debug, Clone)]
pub(crate) struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    pub(crate) fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub(crate) fn at(value: &'a Value, path: impl Into<String>) -> Self {
        Self {
            value,
            path: path.into(),
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn value(&self) -> &'a Value {
        self.value
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path)
        }
    }

    fn mismatch(&self, expected: &str) -> ValidationError {
        ValidationError::schema(
            self.path.clone(),
            format!("expected {expected}, found {}", describe(self.value)),
        )
    }

    fn object(&self) -> Result<&'a Map<String, Value>, ValidationError> {
        self.value.as_object().ok_or_else(|| self.mismatch("object"))
    }

    /// Ensure this node is a JSON object.
    pub(crate) fn expect_object(&self) -> Result<(), ValidationError> {
        self.object().map(|_| ())
    }

    /// Required field: absent is `MissingField`, `null` is a type mismatch.
    pub(crate) fn field(&self, name: &str) -> Result<Node<'a>, ValidationError> {
        let map = self.object()?;
        match map.get(name) {
            Some(value) => Ok(Node::at(value, self.child_path(name))),
            None => Err(ValidationError::missing(self.child_path(name))),
        }
    }

    /// Field that must be present but may be `null`.
    pub(crate) fn nullable(&self, name: &str) -> Result<Option<Node<'a>>, ValidationError> {
        let node = self.field(name)?;
        Ok((!node.value.is_null()).then_some(node))
    }

    /// Field that may be absent or `null`.
    pub(crate) fn optional(&self, name: &str) -> Result<Option<Node<'a>>, ValidationError> {
        let map = self.object()?;
        Ok(map
            .get(name)
            .filter(|value| !value.is_null())
            .map(|value| Node::at(value, self.child_path(name))))
    }

    pub(crate) fn as_str(&self) -> Result<&'a str, ValidationError> {
        self.value.as_str().ok_or_else(|| self.mismatch("string"))
    }

    pub(crate) fn as_u64(&self) -> Result<u64, ValidationError> {
        self.value
            .as_u64()
            .ok_or_else(|| self.mismatch("non-negative integer"))
    }

    pub(crate) fn as_bool(&self) -> Result<bool, ValidationError> {
        self.value.as_bool().ok_or_else(|| self.mismatch("boolean"))
    }

    pub(crate) fn as_array(&self) -> Result<Vec<Node<'a>>, ValidationError> {
        let items = self.value.as_array().ok_or_else(|| self.mismatch("array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(index, value)| Node::at(value, format!("{}[{index}]", self.path)))
            .collect())
    }

    pub(crate) fn as_timestamp(&self) -> Result<OffsetDateTime, ValidationError> {
        let raw = self.as_str()?;
        OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| {
            ValidationError::schema(
                self.path.clone(),
                format!("invalid RFC 3339 timestamp `{raw}`: {err}"),
            )
        })
    }

    pub(crate) fn str(&self, name: &str) -> Result<String, ValidationError> {
        Ok(self.field(name)?.as_str()?.to_string())
    }

    pub(crate) fn u64(&self, name: &str) -> Result<u64, ValidationError> {
        self.field(name)?.as_u64()
    }

    pub(crate) fn bool(&self, name: &str) -> Result<bool, ValidationError> {
        self.field(name)?.as_bool()
    }

    pub(crate) fn nullable_str(&self, name: &str) -> Result<Option<String>, ValidationError> {
        self.nullable(name)?
            .map(|node| node.as_str().map(str::to_string))
            .transpose()
    }

    pub(crate) fn optional_str(&self, name: &str) -> Result<Option<String>, ValidationError> {
        self.optional(name)?
            .map(|node| node.as_str().map(str::to_string))
            .transpose()
    }

    pub(crate) fn optional_u64(&self, name: &str) -> Result<Option<u64>, ValidationError> {
        self.optional(name)?.map(|node| node.as_u64()).transpose()
    }

    pub(crate) fn optional_bool(&self, name: &str) -> Result<Option<bool>, ValidationError> {
        self.optional(name)?.map(|node| node.as_bool()).transpose()
    }

    /// Required object field.
    pub(crate) fn object_field(&self, name: &str) -> Result<Node<'a>, ValidationError> {
        let node = self.field(name)?;
        node.expect_object()?;
        Ok(node)
    }

    /// Required string field restricted to a closed set of values.
    pub(crate) fn one_of<T>(
        &self,
        name: &str,
        values: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, ValidationError> {
        let node = self.field(name)?;
        let raw = node.as_str()?;
        parse(raw).ok_or_else(|| {
            ValidationError::schema(
                node.path.clone(),
                format!("unexpected value `{raw}`, expected one of {}", values.join("|")),
            )
        })
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
