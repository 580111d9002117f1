//! Projection of internal rows into the boundary representation.

use serde_json::{Map, Value as Json};

use crate::{Record, Value};

/// A row as seen by callers: identifiers as decimal strings, everything
/// else unchanged.
pub type Projected = Map<String, Json>;

/// Convert a row for distribution. The 64-bit identifier type becomes its
/// decimal-string external form; other values pass through, nulls included.
pub fn project(record: &Record) -> Projected {
    let mut out = Projected::new();
    for (column, value) in record.iter() {
        let projected = match value {
            Value::Id(id) => Json::String(id.to_string()),
            Value::Int(n) => Json::from(*n),
            Value::Text(s) => Json::String(s.clone()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Null => Json::Null,
        };
        out.insert(column.to_string(), projected);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Snowflake;

    #[test]
    fn identifiers_become_decimal_strings() {
        let record = Record::new()
            .with("guild_id", Snowflake::from_raw(123_456_789_012_345_678))
            .with("name", "test")
            .with("position", 3);
        let projected = project(&record);
        assert_eq!(
            projected.get("guild_id"),
            Some(&Json::String("123456789012345678".to_string()))
        );
        assert_eq!(projected.get("name"), Some(&Json::String("test".to_string())));
        assert_eq!(projected.get("position"), Some(&Json::from(3)));
    }

    #[test]
    fn nulls_and_booleans_pass_through() {
        let record = Record::new()
            .with("icon_id", Value::Null)
            .with("active", true);
        let projected = project(&record);
        assert_eq!(projected.get("icon_id"), Some(&Json::Null));
        assert_eq!(projected.get("active"), Some(&Json::Bool(true)));
    }
}
