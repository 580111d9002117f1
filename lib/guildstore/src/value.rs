//! Runtime values and records exchanged with the storage layer.

use std::collections::BTreeMap;
use std::fmt;

use crate::Snowflake;

/// Database-agnostic column types.
///
/// Declared statically per column in a [`crate::Schema`]; checked at runtime
/// only where externally supplied data enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit snowflake identifier.
    Id,
    /// 32-bit integer.
    Int,
    Text,
    Bool,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Id => "snowflake",
            ColumnType::Int => "integer",
            ColumnType::Text => "text",
            ColumnType::Bool => "boolean",
        }
    }
}

/// A value that can be bound to a statement parameter or returned in a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Id(Snowflake),
    Int(i32),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    /// The declared type this value satisfies; `Null` satisfies none.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Id(_) => Some(ColumnType::Id),
            Value::Int(_) => Some(ColumnType::Int),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self.column_type() {
            Some(column_type) => column_type.name(),
            None => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Id(id) => write!(f, "{id}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<Snowflake> for Value {
    fn from(id: Snowflake) -> Self {
        Value::Id(id)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A transient column-to-value mapping.
///
/// Produced by a caller or an orchestrator, validated against exactly one
/// schema, and discarded at the end of the operation. An absent column and an
/// explicit [`Value::Null`] are distinct states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(column, value)| (column.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_has_no_column_type() {
        assert_eq!(Value::Null.column_type(), None);
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from(7).column_type(), Some(ColumnType::Int));
    }

    #[test]
    fn record_distinguishes_absent_from_null() {
        let record = Record::new().with("icon_id", Value::Null);
        assert!(record.contains("icon_id"));
        assert!(!record.contains("name"));
        assert_eq!(record.get("icon_id"), Some(&Value::Null));
    }
}
