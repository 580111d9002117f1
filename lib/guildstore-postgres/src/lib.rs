//! PostgreSQL executor for guildstore.
//!
//! Wraps an `sqlx::PgPool` so the core's generated statements - positional
//! `?` placeholders, ordered parameters, a prepared-execution flag - run
//! against PostgreSQL. The only adaptation is placeholder renumbering to
//! the `$n` form and mapping row values back into the core's internal
//! representation.
//!
//! # Usage
//!
//! ```text
//! let pool = PgPool::connect("postgres://localhost/guilds").await?;
//! let store = GuildStore::new(pool)?;
//! let guild = store.create_guild(Some("test"), Some(&Value::from("123"))).await?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod executor;

pub use executor::PgPool;

// Re-export core types for convenience
pub use guildstore::{
    ChannelFilter, ChannelSpec, Executor, GuildFilter, GuildStore, Projected, Record, Snowflake,
    SnowflakeGenerator, Statement, StorageError, Value,
};
