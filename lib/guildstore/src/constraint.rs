//! Schema-agnostic assembly of WHERE/LIMIT fragments for read operations.
//!
//! Read filters arrive as optional values: an absent (or explicitly null)
//! optional filter is silently ignored, an absent required filter is an
//! error, and a present filter with an illegal value is an error. Errors
//! accumulate across every call and are raised as one batch by
//! [`ConstraintSet::finish`].

use crate::error::ensure_valid;
use crate::{Snowflake, StorageError, Value};

/// Accumulator for filter predicates, their parameters, and any errors.
#[derive(Default)]
pub struct ConstraintSet {
    constraints: Vec<String>,
    params: Vec<Value>,
    limit: Option<Value>,
    errors: Vec<String>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identifier predicate such as `channel_id <` for the named
    /// filter. The value must be a snowflake in either boundary form; it is
    /// coerced to the internal form before being bound.
    pub fn snowflake(&mut self, key: &str, predicate: &str, value: Option<&Value>, required: bool) {
        match value {
            None | Some(Value::Null) => {
                if required {
                    self.errors.push(format!(
                        "'{key}' must be a snowflake (either a decimal string or an id), \
                         but none was supplied"
                    ));
                }
            }
            Some(value) => match Snowflake::try_from(value) {
                Ok(id) => {
                    self.constraints.push(format!("{predicate} ?"));
                    self.params.push(Value::Id(id));
                }
                Err(detail) => self.errors.push(format!(
                    "'{key}' must be a snowflake (either a decimal string or an id), but {detail}"
                )),
            },
        }
    }

    /// Cap the result set. Absent means no cap; anything but a positive
    /// integer is an error.
    pub fn limit(&mut self, limit: Option<&Value>) {
        match limit {
            None | Some(Value::Null) => {}
            Some(Value::Int(n)) if *n >= 1 => self.limit = Some(Value::Int(*n)),
            Some(Value::Int(n)) => self.errors.push(format!(
                "'limit' search filter must be a positive integer, but {n} was supplied"
            )),
            Some(other) => self.errors.push(format!(
                "'limit' search filter must be an integer, but {other} of type {} was supplied",
                other.type_name()
            )),
        }
    }

    /// Produce the criteria fragment and its ordered parameters, or the
    /// batched errors. The limit parameter is always bound last.
    pub fn finish(self) -> Result<(String, Vec<Value>), StorageError> {
        ensure_valid(self.errors)?;

        let mut fragment = String::new();
        let mut params = self.params;
        if !self.constraints.is_empty() {
            fragment.push_str("WHERE ");
            fragment.push_str(&self.constraints.join(" AND "));
        }
        if let Some(limit) = self.limit {
            if !fragment.is_empty() {
                fragment.push(' ');
            }
            fragment.push_str("LIMIT ?");
            params.push(limit);
        }
        Ok((fragment, params))
    }
}
