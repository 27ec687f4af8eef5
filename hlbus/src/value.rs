//! Structured results decoded from device responses.
//!
//! A response is a dynamically typed JSON tree ([`Value`]). Object keys are
//! unique and keep their wire order. A [`CommandResult`] owns the tree for
//! one invocation and releases it when consumed or dropped.

use serde::de::DeserializeOwned;
pub use serde_json::Value;

use crate::error::{Error, Result};

/// Applies `visitor` to every element of an array, in order.
///
/// `null` elements are visited too; skipping them is up to the visitor. A
/// non-array value is visited once, as itself.
pub fn for_each<'v>(value: &'v Value, mut visitor: impl FnMut(&'v Value)) {
    match value {
        Value::Array(items) => items.iter().for_each(visitor),
        other => visitor(other),
    }
}

/// Case-sensitive key lookup; `None` when absent or when `value` is not an object.
pub fn get<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value.as_object().and_then(|map| map.get(key))
}

/// Reads a required string field.
pub fn require_str<'v>(value: &'v Value, key: &str) -> Result<&'v str> {
    match get(value, key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::Protocol(format!(
            "field `{key}` must be a string, got {}",
            kind(other)
        ))),
        None => Err(Error::Protocol(format!("missing field `{key}`"))),
    }
}

/// Reads a required integer field.
pub fn require_i64(value: &Value, key: &str) -> Result<i64> {
    match get(value, key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::Protocol(format!("field `{key}` must be an integer, got {n}"))),
        Some(other) => Err(Error::Protocol(format!(
            "field `{key}` must be an integer, got {}",
            kind(other)
        ))),
        None => Err(Error::Protocol(format!("missing field `{key}`"))),
    }
}

/// Names the kind of a value for diagnostics.
pub const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of a successful invocation; owns the decoded response tree.
///
/// Borrowed views into the tree cannot outlive the result, and
/// [`release`](Self::release) consumes it, so a second release or a use after
/// release does not compile. Dropping the result releases the tree on every
/// other path.
#[derive(Debug, PartialEq)]
#[must_use = "a CommandResult carries the device's response"]
pub struct CommandResult {
    /// Root of the response tree.
    value: Value,
}

impl CommandResult {
    /// Wraps a decoded response tree.
    pub(crate) const fn new(value: Value) -> Self {
        Self { value }
    }

    /// Borrows the root value.
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Visits the root array's elements in order, nulls included.
    pub fn for_each<'v>(&'v self, visitor: impl FnMut(&'v Value)) {
        for_each(&self.value, visitor);
    }

    /// Looks up `key` on the root object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        get(&self.value, key)
    }

    /// Deserializes the tree into a typed schema.
    ///
    /// Any mismatch (missing field, wrong kind) is an [`Error::Protocol`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.value).map_err(Error::protocol)
    }

    /// Takes ownership of the tree.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Frees the tree.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn inventory() -> Value {
        json!([{"id": "bolt", "Count": 3}, null, {"id": "nut", "Count": 5}])
    }

    #[test]
    fn for_each_visits_nulls_in_order() {
        let value = inventory();
        let mut seen = Vec::new();
        for_each(&value, |item| seen.push(kind(item)));
        assert_eq!(seen, ["object", "null", "object"]);
    }

    #[test]
    fn skipping_nulls_reads_items_in_order() {
        let result = CommandResult::new(inventory());
        let mut items = Vec::new();
        result.for_each(|item| {
            if item.is_null() {
                return;
            }
            items.push((
                require_str(item, "id").unwrap().to_owned(),
                require_i64(item, "Count").unwrap(),
            ));
        });
        assert_eq!(items, [("bolt".to_owned(), 3), ("nut".to_owned(), 5)]);
        result.release();
    }

    #[test]
    fn for_each_on_scalar_visits_once() {
        let mut count = 0;
        for_each(&json!(42), |_| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn get_is_case_sensitive() {
        let item = json!({"Count": 2});
        assert!(get(&item, "Count").is_some());
        assert!(get(&item, "count").is_none());
        assert!(get(&json!([1]), "Count").is_none());
    }

    #[test]
    fn missing_field_is_protocol_error() {
        let item = json!({"Count": 2});
        let err = require_str(&item, "id").unwrap_err();
        assert!(matches!(err, Error::Protocol(m) if m.contains("`id`")));
    }

    #[test]
    fn wrong_kind_is_protocol_error() {
        let item = json!({"id": 7, "Count": "many"});
        assert!(matches!(require_str(&item, "id"), Err(Error::Protocol(_))));
        assert!(matches!(require_i64(&item, "Count"), Err(Error::Protocol(_))));
        assert!(matches!(
            require_i64(&json!({"Count": 1.5}), "Count"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn object_keys_keep_wire_order() {
        let value: Value = serde_json::from_str(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn decode_reports_schema_mismatch() {
        let result = CommandResult::new(json!({"id": "bolt"}));
        let err = result.decode::<Vec<Value>>().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(result.into_value(), json!({"id": "bolt"}));
    }
}
