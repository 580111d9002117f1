//! PostgreSQL implementation of the guildstore executor contract.

const DEFAULT_MAX_CONNECTIONS: u32 = 16;

use async_trait::async_trait;
use guildstore::{Executor, Record, Snowflake, Statement, StorageError, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Arguments, Column, Row, TypeInfo};
use std::ops::Deref;

/// Wrapper around sqlx::PgPool that implements [`Executor`].
#[derive(Clone, Debug)]
pub struct PgPool(sqlx::PgPool);

impl PgPool {
    /// Create a new PgPool from an sqlx PgPool.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self(pool)
    }

    /// Connect to a PostgreSQL database.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(|e| StorageError::Storage(e.to_string()))?;
        Ok(Self(pool))
    }

    /// Get the inner sqlx::PgPool.
    pub fn inner(&self) -> &sqlx::PgPool {
        &self.0
    }
}

impl Deref for PgPool {
    type Target = sqlx::PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rewrite positional `?` placeholders to PostgreSQL's `$1..$n` form.
/// Generated statements never carry quoted literals, so every `?` is a
/// placeholder.
fn renumber_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut index = 0;
    for ch in text.chars() {
        if ch == '?' {
            index += 1;
            out.push('$');
            out.push_str(&index.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Bind statement parameters to PgArguments.
fn bind_params(args: &mut PgArguments, params: &[Value]) -> Result<(), StorageError> {
    for value in params {
        match value {
            Value::Id(id) => args.add(id.raw()),
            Value::Int(n) => args.add(*n),
            Value::Text(s) => args.add(s.as_str()),
            Value::Bool(b) => args.add(*b),
            Value::Null => args.add(None::<String>),
        }
        .map_err(|e| StorageError::Storage(e.to_string()))?;
    }
    Ok(())
}

/// Decode a row back into the internal representation. 64-bit integer
/// columns hold identifiers; 16/32-bit integers are plain integers.
fn decode_row(row: &PgRow) -> Result<Record, StorageError> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT8" | "BIGINT" => row
                .try_get::<Option<i64>, _>(index)
                .map(|v| v.map(|n| Value::Id(Snowflake::from_raw(n)))),
            "INT2" | "INT4" | "SMALLINT" | "INTEGER" => row
                .try_get::<Option<i32>, _>(index)
                .map(|v| v.map(Value::Int)),
            "BOOL" => row
                .try_get::<Option<bool>, _>(index)
                .map(|v| v.map(Value::Bool)),
            _ => row
                .try_get::<Option<String>, _>(index)
                .map(|v| v.map(Value::Text)),
        }
        .map_err(|e| StorageError::Storage(e.to_string()))?
        .unwrap_or(Value::Null);
        record.set(column.name(), value);
    }
    Ok(record)
}

#[async_trait]
impl Executor for PgPool {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Record>, StorageError> {
        let sql = renumber_placeholders(&statement.text);
        let mut args = PgArguments::default();
        bind_params(&mut args, &statement.params)?;

        let rows = sqlx::query_with(&sql, args)
            .persistent(statement.prepared)
            .fetch_all(&self.0)
            .await
            .map_err(|e| StorageError::Storage(e.to_string()))?;

        rows.iter().map(decode_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_renumbered_left_to_right() {
        assert_eq!(
            renumber_placeholders("INSERT INTO guilds (guild_id, name, icon_id) VALUES (?, ?, ?);"),
            "INSERT INTO guilds (guild_id, name, icon_id) VALUES ($1, $2, $3);"
        );
        assert_eq!(
            renumber_placeholders("UPDATE guilds SET name = ? WHERE guild_id = ?;"),
            "UPDATE guilds SET name = $1 WHERE guild_id = $2;"
        );
        assert_eq!(
            renumber_placeholders("SELECT * FROM guilds;"),
            "SELECT * FROM guilds;"
        );
    }

    #[test]
    fn binding_accepts_every_value_variant() {
        let mut args = PgArguments::default();
        let params = vec![
            Value::Id(Snowflake::from_raw(1)),
            Value::Int(2),
            Value::from("three"),
            Value::Bool(true),
            Value::Null,
        ];
        assert!(bind_params(&mut args, &params).is_ok());
    }
}
