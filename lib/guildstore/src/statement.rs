//! Parameterized statement generation and the execution contract.
//!
//! Every builder first trims its input to the schema's declared columns,
//! so unknown keys are silently dropped before validation or statement
//! assembly. Parameters are ordered left-to-right to match the positional
//! `?` placeholders in the statement text.

use async_trait::async_trait;

use crate::error::ensure_valid;
use crate::{Record, Schema, StorageError, Value};

/// A ready-to-execute statement: text with positional `?` placeholders, the
/// matching ordered parameters, and execution options.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Value>,
    /// Compile once and reuse across parameter bindings.
    pub prepared: bool,
}

impl Statement {
    fn new(text: String, params: Vec<Value>) -> Self {
        Self {
            text,
            params,
            prepared: true,
        }
    }
}

fn equality_list(columns: &[&str], separator: &str) -> String {
    columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(separator)
}

impl Schema {
    /// Columns present in `record`, in declaration order, with their values.
    fn present_columns<'a>(&'a self, record: &'a Record) -> Vec<(&'a str, &'a Value)> {
        self.keys()
            .filter_map(|key| record.get(key).map(|value| (key, value)))
            .collect()
    }

    /// `INSERT INTO <table> (<columns>) VALUES (<placeholders>)` for a new
    /// record. Trims, then validates as a new record; a non-empty error
    /// batch fails the build.
    pub fn insert_statement(&self, record: &Record) -> Result<Statement, StorageError> {
        let record = self.trim(record);
        ensure_valid(self.validate(&record, false))?;

        let present = self.present_columns(&record);
        let columns: Vec<&str> = present.iter().map(|(key, _)| *key).collect();
        let params: Vec<Value> = present.iter().map(|(_, value)| (*value).clone()).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");

        Ok(Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({});",
                self.name(),
                columns.join(", "),
                placeholders
            ),
            params,
        ))
    }

    /// `SELECT * FROM <table> <criteria>` around a pre-built WHERE/LIMIT
    /// fragment. Read criteria never have to satisfy record-shape
    /// invariants, so there is no validation here.
    pub fn select_statement(&self, criteria: &str, params: Vec<Value>) -> Statement {
        let text = if criteria.is_empty() {
            format!("SELECT * FROM {};", self.name())
        } else {
            format!("SELECT * FROM {} {};", self.name(), criteria)
        };
        Statement::new(text, params)
    }

    /// `UPDATE <table> SET ... WHERE ...` from a change-set containing both
    /// the new values and the immutable identity columns. Trims, validates
    /// as an update, then partitions the surviving columns: mutable columns
    /// go to SET, immutable ones to WHERE. SET parameters come first.
    pub fn update_statement(&self, changes: &Record) -> Result<Statement, StorageError> {
        let changes = self.trim(changes);
        ensure_valid(self.validate(&changes, true))?;

        let present = self.present_columns(&changes);
        let mut set_columns = Vec::new();
        let mut where_columns = Vec::new();
        for (key, value) in present {
            if self.is_immutable(key) {
                where_columns.push((key, value));
            } else {
                set_columns.push((key, value));
            }
        }

        let mut params: Vec<Value> = Vec::with_capacity(set_columns.len() + where_columns.len());
        params.extend(set_columns.iter().map(|(_, value)| (*value).clone()));
        params.extend(where_columns.iter().map(|(_, value)| (*value).clone()));

        let set_names: Vec<&str> = set_columns.iter().map(|(key, _)| *key).collect();
        let where_names: Vec<&str> = where_columns.iter().map(|(key, _)| *key).collect();

        Ok(Statement::new(
            format!(
                "UPDATE {} SET {} WHERE {};",
                self.name(),
                equality_list(&set_names, ", "),
                equality_list(&where_names, " AND ")
            ),
            params,
        ))
    }

    /// `DELETE FROM <table> WHERE ...` keyed only by immutable identity
    /// columns. Criteria naming any updatable column are rejected before a
    /// statement is produced, so every delete targets rows by stable
    /// identity.
    pub fn delete_statement(&self, criteria: &Record) -> Result<Statement, StorageError> {
        let criteria = self.trim(criteria);

        let mut errors = Vec::new();
        for (key, _) in criteria.iter() {
            if !self.is_immutable(key) {
                errors.push(format!(
                    "DELETE criteria may only be immutable columns ({}), but {} was supplied",
                    self.immutables().collect::<Vec<_>>().join(", "),
                    key
                ));
            }
        }
        ensure_valid(errors)?;

        let present = self.present_columns(&criteria);
        let columns: Vec<&str> = present.iter().map(|(key, _)| *key).collect();
        let params: Vec<Value> = present.iter().map(|(_, value)| (*value).clone()).collect();

        Ok(Statement::new(
            format!(
                "DELETE FROM {} WHERE {};",
                self.name(),
                equality_list(&columns, " AND ")
            ),
            params,
        ))
    }
}

/// Narrow execution contract the core requires from a database driver.
///
/// Rows map column names to internal-typed values. Failures propagate to
/// callers unchanged; the core never retries and holds no locks around
/// execution.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Record>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Column, ColumnType, SchemaBuilder, Snowflake};

    fn guilds() -> Schema {
        SchemaBuilder::new("guilds")
            .column(
                Column::new("guild_id", ColumnType::Id)
                    .required()
                    .immutable()
                    .automatic()
                    .update_key(),
            )
            .column(Column::new("name", ColumnType::Text))
            .column(Column::new("icon_id", ColumnType::Id))
            .build()
            .unwrap()
    }

    #[test]
    fn insert_drops_unknown_columns() {
        let record = Record::new()
            .with("guild_id", Snowflake::from_raw(1))
            .with("name", "test")
            .with("icon_id", Snowflake::from_raw(2))
            .with("bogus", "dropped");
        let statement = guilds().insert_statement(&record).unwrap();
        assert_eq!(
            statement.text,
            "INSERT INTO guilds (guild_id, name, icon_id) VALUES (?, ?, ?);"
        );
        assert_eq!(statement.params.len(), 3);
        assert!(!statement.params.contains(&Value::from("dropped")));
        assert!(statement.prepared);
    }

    #[test]
    fn insert_parameters_follow_declaration_order() {
        let record = Record::new()
            .with("icon_id", Snowflake::from_raw(2))
            .with("guild_id", Snowflake::from_raw(1))
            .with("name", "test");
        let statement = guilds().insert_statement(&record).unwrap();
        assert_eq!(
            statement.params,
            vec![
                Value::Id(Snowflake::from_raw(1)),
                Value::from("test"),
                Value::Id(Snowflake::from_raw(2)),
            ]
        );
    }

    #[test]
    fn insert_with_invalid_record_is_a_batched_failure() {
        let record = Record::new().with("name", "test");
        match guilds().insert_statement(&record) {
            Err(StorageError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn select_wraps_the_supplied_fragment() {
        let statement = guilds().select_statement(
            "WHERE guild_id = ? LIMIT ?",
            vec![Value::Id(Snowflake::from_raw(1)), Value::Int(5)],
        );
        assert_eq!(
            statement.text,
            "SELECT * FROM guilds WHERE guild_id = ? LIMIT ?;"
        );
        assert_eq!(statement.params.len(), 2);

        let unfiltered = guilds().select_statement("", Vec::new());
        assert_eq!(unfiltered.text, "SELECT * FROM guilds;");
    }

    #[test]
    fn update_partitions_set_and_where_columns() {
        let changes = Record::new()
            .with("guild_id", Snowflake::from_raw(1))
            .with("name", "renamed")
            .with("icon_id", Snowflake::from_raw(9));
        let statement = guilds().update_statement(&changes).unwrap();
        assert_eq!(
            statement.text,
            "UPDATE guilds SET name = ?, icon_id = ? WHERE guild_id = ?;"
        );
        assert_eq!(
            statement.params,
            vec![
                Value::from("renamed"),
                Value::Id(Snowflake::from_raw(9)),
                Value::Id(Snowflake::from_raw(1)),
            ]
        );
    }

    #[test]
    fn update_that_changes_nothing_is_rejected() {
        let changes = Record::new().with("guild_id", Snowflake::from_raw(1));
        match guilds().update_statement(&changes) {
            Err(StorageError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("At least one key"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn delete_rejects_mutable_criteria_before_building() {
        let criteria = Record::new()
            .with("guild_id", Snowflake::from_raw(1))
            .with("name", "test");
        match guilds().delete_statement(&criteria) {
            Err(StorageError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("immutable columns (guild_id)"));
                assert!(errors[0].contains("name was supplied"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn delete_by_identity_builds_an_and_chain() {
        let channels = SchemaBuilder::new("channels_by_guild")
            .column(Column::new("guild_id", ColumnType::Id).required().immutable().update_key())
            .column(Column::new("position", ColumnType::Int))
            .column(Column::new("channel_id", ColumnType::Id).immutable().automatic().update_key())
            .column(Column::new("name", ColumnType::Text))
            .build()
            .unwrap();
        let criteria = Record::new()
            .with("guild_id", Snowflake::from_raw(1))
            .with("channel_id", Snowflake::from_raw(2));
        let statement = channels.delete_statement(&criteria).unwrap();
        assert_eq!(
            statement.text,
            "DELETE FROM channels_by_guild WHERE guild_id = ? AND channel_id = ?;"
        );
        assert_eq!(statement.params.len(), 2);
    }
}
