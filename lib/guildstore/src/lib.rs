//! guildstore - schema-driven statement generation for guild and channel
//! storage.
//!
//! This crate turns declarative table schemas into validated, parameterized
//! statements for guild containers and the ordered channels within them.
//! Execution is delegated to an injected [`Executor`]; the crate itself
//! never touches a driver or connection pool.
//!
//! # Core pieces
//!
//! - [`Schema`] / [`SchemaBuilder`]: declarative table descriptions with a
//!   frozen validation pipeline
//! - [`Statement`]: statement text, ordered parameters, execution options
//! - [`ConstraintSet`]: WHERE/LIMIT assembly for read filters
//! - [`Snowflake`] / [`SnowflakeGenerator`]: time-ordered identifiers with a
//!   decimal-string boundary form
//! - [`GuildStore`]: the CRUD orchestrators composing all of the above

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::unwrap_in_result,
        clippy::panic
    )
)]

mod constraint;
mod error;
mod project;
mod repository;
mod schema;
mod snowflake;
mod statement;
mod value;

pub use constraint::ConstraintSet;
pub use error::StorageError;
pub use project::{Projected, project};
pub use repository::{ChannelFilter, ChannelSpec, GuildFilter, GuildStore};
pub use schema::{Column, Schema, SchemaBuilder, Validator};
pub use snowflake::{EPOCH_MS, Snowflake, SnowflakeGenerator};
pub use statement::{Executor, Statement};
pub use value::{ColumnType, Record, Value};
