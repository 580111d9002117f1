//! CRUD orchestration for guilds and the channels ordered within them.
//!
//! [`GuildStore`] owns its schemas and identifier generator and delegates
//! execution to an injected [`Executor`]. Every operation validates its
//! arguments up front and raises all problems in one batch; identifiers are
//! accepted in either boundary form and always returned as decimal strings.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::error::ensure_valid;
use crate::{
    Column, ColumnType, ConstraintSet, Executor, Projected, Record, Schema, SchemaBuilder,
    Snowflake, SnowflakeGenerator, Statement, StorageError, Value, project,
};

/// Optional filters for [`GuildStore::guilds`].
#[derive(Debug, Clone, Default)]
pub struct GuildFilter {
    pub guild_id: Option<Value>,
    pub limit: Option<Value>,
}

/// Optional filters for [`GuildStore::channels`]. `before` and `after` are
/// exclusive `channel_id` bounds for cursor-style pagination over the
/// partition.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub channel_id: Option<Value>,
    pub limit: Option<Value>,
}

/// One channel in a [`GuildStore::replace_channels`] request. A present
/// `channel_id` is reused; an absent one is generated.
#[derive(Debug, Clone, Default)]
pub struct ChannelSpec {
    pub channel_id: Option<Value>,
    pub name: Option<String>,
    pub position: Option<Value>,
}

#[allow(clippy::expect_used)]
static CHANNEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z](?:-?[a-z])*$").expect("channel name pattern"));

const CHANNEL_NAME_MAX: usize = 64;

fn check_channel_name(record: &Record, _is_update: bool) -> Vec<String> {
    match record.get("name") {
        Some(Value::Text(name)) => {
            if name.len() <= CHANNEL_NAME_MAX && CHANNEL_NAME.is_match(name) {
                Vec::new()
            } else {
                vec![format!(
                    "Channel name must be composed only of lowercase a-z and hyphens, \
                     with no more than one consecutive hyphen, starting and ending with \
                     a letter, but \"{name}\" was supplied"
                )]
            }
        }
        // absent or mistyped names are the built-in passes' concern
        _ => Vec::new(),
    }
}

fn guild_schema() -> Result<Schema, StorageError> {
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
}

fn channel_schema() -> Result<Schema, StorageError> {
    SchemaBuilder::new("channels_by_guild")
        .column(
            Column::new("guild_id", ColumnType::Id)
                .required()
                .immutable()
                .update_key(),
        )
        .column(Column::new("position", ColumnType::Int))
        .column(
            Column::new("channel_id", ColumnType::Id)
                .immutable()
                .automatic()
                .update_key(),
        )
        .column(Column::new("name", ColumnType::Text))
        .validator(check_channel_name)
        .build()
}

fn require_snowflake(
    kind: &str,
    value: Option<&Value>,
    errors: &mut Vec<String>,
) -> Option<Snowflake> {
    match value {
        None | Some(Value::Null) => {
            errors.push(format!(
                "A {kind} snowflake must be passed, but none was supplied"
            ));
            None
        }
        Some(value) => match Snowflake::try_from(value) {
            Ok(id) => Some(id),
            Err(detail) => {
                errors.push(format!("A {kind} snowflake must be passed, but {detail}"));
                None
            }
        },
    }
}

fn require_name(name: Option<&str>, errors: &mut Vec<String>) -> Option<String> {
    match name {
        None => {
            errors.push("A name must be passed, but none was supplied".to_string());
            None
        }
        Some(name) => Some(name.to_string()),
    }
}

fn optional_position(position: Option<&Value>, errors: &mut Vec<String>) -> Option<i32> {
    match position {
        None | Some(Value::Null) => None,
        Some(Value::Int(n)) if *n >= 0 => Some(*n),
        Some(other) => {
            errors.push(format!(
                "A position must be a non-negative integer, but {other} was supplied"
            ));
            None
        }
    }
}

fn missing(kind: &str) -> StorageError {
    StorageError::Validation(vec![format!(
        "A {kind} must be passed, but none was supplied"
    )])
}

/// Data-access layer for guild containers and their ordered channels.
///
/// Holds no locks; schemas are immutable after construction and the store is
/// safe for unlimited concurrent calls. In-flight executor failures
/// propagate unchanged and nothing is retried.
pub struct GuildStore<E> {
    executor: E,
    generator: SnowflakeGenerator,
    guild_schema: Schema,
    channel_schema: Schema,
}

impl<E: Executor> GuildStore<E> {
    pub fn new(executor: E) -> Result<Self, StorageError> {
        Self::with_generator(executor, SnowflakeGenerator::new())
    }

    pub fn with_generator(
        executor: E,
        generator: SnowflakeGenerator,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            executor,
            generator,
            guild_schema: guild_schema()?,
            channel_schema: channel_schema()?,
        })
    }

    async fn execute(&self, statement: &Statement) -> Result<Vec<Record>, StorageError> {
        debug!(
            "executing `{}` with {} parameters",
            statement.text,
            statement.params.len()
        );
        self.executor.execute(statement).await
    }

    /// Create a guild. Both arguments are mandatory; the guild identifier is
    /// generated here. Returns the projected record.
    pub async fn create_guild(
        &self,
        name: Option<&str>,
        icon: Option<&Value>,
    ) -> Result<Projected, StorageError> {
        let mut errors = Vec::new();
        let name = require_name(name, &mut errors);
        let icon = require_snowflake("icon", icon, &mut errors);
        ensure_valid(errors)?;
        let (Some(name), Some(icon)) = (name, icon) else {
            return Err(missing("name and icon snowflake"));
        };

        let record = Record::new()
            .with("guild_id", self.generator.generate())
            .with("name", name)
            .with("icon_id", icon);
        let statement = self.guild_schema.insert_statement(&record)?;
        self.execute(&statement).await?;
        Ok(project(&record))
    }

    /// List guilds, optionally filtered by identifier and capped.
    pub async fn guilds(&self, filter: &GuildFilter) -> Result<Vec<Projected>, StorageError> {
        let mut constraints = ConstraintSet::new();
        constraints.snowflake("guild_id", "guild_id =", filter.guild_id.as_ref(), false);
        constraints.limit(filter.limit.as_ref());
        let (fragment, params) = constraints.finish()?;

        let statement = self.guild_schema.select_statement(&fragment, params);
        let rows = self.execute(&statement).await?;
        Ok(rows.iter().map(project).collect())
    }

    /// Update an existing guild and return the freshened record.
    ///
    /// The existence check, the write, and the re-read are three separate
    /// statements; a concurrent writer can interleave between them, so the
    /// final record may reflect a third party's changes and a concurrent
    /// update can be overwritten. The executor contract offers no
    /// conditional write to close this window.
    pub async fn update_guild(
        &self,
        guild: Option<&Value>,
        changes: &Record,
    ) -> Result<Projected, StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        if changes.is_empty() {
            errors.push(
                "A set of changes to be made must be passed, but an empty one was supplied"
                    .to_string(),
            );
        }
        ensure_valid(errors)?;
        let Some(guild_id) = guild_id else {
            return Err(missing("guild snowflake"));
        };

        let mut changes = self.guild_schema.coerce_identifiers(changes.clone());
        changes.set("guild_id", guild_id);

        if !self.guild_exists(guild_id).await? {
            return Err(StorageError::NotFound(format!(
                "Only existing guilds may be updated, but no guild with id {guild_id} was found"
            )));
        }

        let statement = self.guild_schema.update_statement(&changes)?;
        self.execute(&statement).await?;

        let filter = GuildFilter {
            guild_id: Some(Value::Id(guild_id)),
            ..GuildFilter::default()
        };
        self.guilds(&filter).await?.into_iter().next().ok_or_else(|| {
            StorageError::NotFound(format!(
                "Guild {guild_id} disappeared while it was being updated"
            ))
        })
    }

    /// Delete a guild, keyed only by its immutable identity.
    pub async fn delete_guild(&self, guild: Option<&Value>) -> Result<(), StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        ensure_valid(errors)?;
        let Some(guild_id) = guild_id else {
            return Err(missing("guild snowflake"));
        };

        let criteria = Record::new().with("guild_id", guild_id);
        let statement = self.guild_schema.delete_statement(&criteria)?;
        self.execute(&statement).await?;
        Ok(())
    }

    async fn guild_exists(&self, guild_id: Snowflake) -> Result<bool, StorageError> {
        let filter = GuildFilter {
            guild_id: Some(Value::Id(guild_id)),
            ..GuildFilter::default()
        };
        Ok(!self.guilds(&filter).await?.is_empty())
    }

    /// Create a channel in a guild. When no position is supplied the channel
    /// is appended to the end of the guild: its position is the current
    /// count of channels already in the partition.
    pub async fn create_channel(
        &self,
        guild: Option<&Value>,
        name: Option<&str>,
        position: Option<&Value>,
    ) -> Result<Projected, StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        let name = require_name(name, &mut errors);
        let position = optional_position(position, &mut errors);
        ensure_valid(errors)?;
        let (Some(guild_id), Some(name)) = (guild_id, name) else {
            return Err(missing("guild snowflake and name"));
        };

        self.insert_channel(guild_id, self.generator.generate(), &name, position)
            .await
    }

    /// Insert a channel with a caller-supplied identifier. Used by
    /// [`replace_channels`](Self::replace_channels) to reattach channels
    /// that already have identities.
    pub async fn add_channel(
        &self,
        guild: Option<&Value>,
        channel: Option<&Value>,
        name: Option<&str>,
        position: Option<&Value>,
    ) -> Result<Projected, StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        let channel_id = require_snowflake("channel", channel, &mut errors);
        let name = require_name(name, &mut errors);
        let position = optional_position(position, &mut errors);
        ensure_valid(errors)?;
        let (Some(guild_id), Some(channel_id), Some(name)) = (guild_id, channel_id, name) else {
            return Err(missing("guild snowflake, channel snowflake and name"));
        };

        self.insert_channel(guild_id, channel_id, &name, position)
            .await
    }

    async fn insert_channel(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
        name: &str,
        position: Option<i32>,
    ) -> Result<Projected, StorageError> {
        let position = match position {
            Some(position) => position,
            None => {
                let position = self.channel_count(guild_id).await?;
                debug!("appending channel to guild {guild_id} at position {position}");
                position
            }
        };

        let record = Record::new()
            .with("guild_id", guild_id)
            .with("position", position)
            .with("channel_id", channel_id)
            .with("name", name);
        let statement = self.channel_schema.insert_statement(&record)?;
        self.execute(&statement).await?;
        Ok(project(&record))
    }

    async fn channel_count(&self, guild_id: Snowflake) -> Result<i32, StorageError> {
        let rows = self
            .channels(Some(&Value::Id(guild_id)), &ChannelFilter::default())
            .await?;
        Ok(i32::try_from(rows.len()).unwrap_or(i32::MAX))
    }

    /// List the channels of a guild. The guild identifier is the partition
    /// key and is required; the filter's bounds and limit are optional.
    pub async fn channels(
        &self,
        guild: Option<&Value>,
        filter: &ChannelFilter,
    ) -> Result<Vec<Projected>, StorageError> {
        let mut constraints = ConstraintSet::new();
        constraints.snowflake("guild", "guild_id =", guild, true);
        constraints.snowflake("before", "channel_id <", filter.before.as_ref(), false);
        constraints.snowflake("after", "channel_id >", filter.after.as_ref(), false);
        constraints.snowflake("channel_id", "channel_id =", filter.channel_id.as_ref(), false);
        constraints.limit(filter.limit.as_ref());
        let (fragment, params) = constraints.finish()?;

        let statement = self.channel_schema.select_statement(&fragment, params);
        let rows = self.execute(&statement).await?;
        Ok(rows.iter().map(project).collect())
    }

    /// Update an existing channel and return the freshened record. Subject
    /// to the same non-atomic check-write-reread window as
    /// [`update_guild`](Self::update_guild).
    pub async fn update_channel(
        &self,
        guild: Option<&Value>,
        channel: Option<&Value>,
        changes: &Record,
    ) -> Result<Projected, StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        let channel_id = require_snowflake("channel", channel, &mut errors);
        if changes.is_empty() {
            errors.push(
                "A set of changes to be made must be passed, but an empty one was supplied"
                    .to_string(),
            );
        }
        ensure_valid(errors)?;
        let (Some(guild_id), Some(channel_id)) = (guild_id, channel_id) else {
            return Err(missing("guild snowflake and channel snowflake"));
        };

        let mut changes = self.channel_schema.coerce_identifiers(changes.clone());
        changes.set("guild_id", guild_id);
        changes.set("channel_id", channel_id);

        let filter = ChannelFilter {
            channel_id: Some(Value::Id(channel_id)),
            ..ChannelFilter::default()
        };
        let existing = self.channels(Some(&Value::Id(guild_id)), &filter).await?;
        if existing.is_empty() {
            return Err(StorageError::NotFound(format!(
                "Only existing channels may be updated, but no channel with id {channel_id} \
                 was found in guild {guild_id}"
            )));
        }

        let statement = self.channel_schema.update_statement(&changes)?;
        self.execute(&statement).await?;

        self.channels(Some(&Value::Id(guild_id)), &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StorageError::NotFound(format!(
                    "Channel {channel_id} disappeared while it was being updated"
                ))
            })
    }

    /// Delete a channel, keyed by its two immutable identity columns.
    pub async fn delete_channel(
        &self,
        guild: Option<&Value>,
        channel: Option<&Value>,
    ) -> Result<(), StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        let channel_id = require_snowflake("channel", channel, &mut errors);
        ensure_valid(errors)?;
        let (Some(guild_id), Some(channel_id)) = (guild_id, channel_id) else {
            return Err(missing("guild snowflake and channel snowflake"));
        };

        let criteria = Record::new()
            .with("guild_id", guild_id)
            .with("channel_id", channel_id);
        let statement = self.channel_schema.delete_statement(&criteria)?;
        self.execute(&statement).await?;
        Ok(())
    }

    /// Delete every channel in a guild with a single statement keyed by the
    /// partition identity.
    pub async fn clear_channels(&self, guild: Option<&Value>) -> Result<(), StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        ensure_valid(errors)?;
        let Some(guild_id) = guild_id else {
            return Err(missing("guild snowflake"));
        };

        let criteria = Record::new().with("guild_id", guild_id);
        let statement = self.channel_schema.delete_statement(&criteria)?;
        self.execute(&statement).await?;
        Ok(())
    }

    /// Replace every channel in a guild with the supplied set, ordered by
    /// position.
    ///
    /// Not atomic: the existing channels are deleted first, then the new set
    /// is recreated one statement at a time. A failure partway through
    /// leaves the deletion in effect alongside a partial recreate; errors
    /// are collected per channel and raised together once every entry has
    /// been attempted.
    pub async fn replace_channels(
        &self,
        guild: Option<&Value>,
        mut channels: Vec<ChannelSpec>,
    ) -> Result<Vec<Projected>, StorageError> {
        let mut errors = Vec::new();
        let guild_id = require_snowflake("guild", guild, &mut errors);
        ensure_valid(errors)?;
        let Some(guild_id) = guild_id else {
            return Err(missing("guild snowflake"));
        };

        channels.sort_by_key(|spec| match spec.position {
            Some(Value::Int(n)) if n >= 0 => n,
            _ => i32::MAX,
        });

        self.clear_channels(Some(&Value::Id(guild_id))).await?;

        let mut created = Vec::new();
        let mut errors = Vec::new();
        for spec in channels {
            let mut spec_errors = Vec::new();
            let name = require_name(spec.name.as_deref(), &mut spec_errors);
            let position = optional_position(spec.position.as_ref(), &mut spec_errors);
            let channel_id = match spec.channel_id.as_ref() {
                None | Some(Value::Null) => Some(self.generator.generate()),
                Some(value) => match Snowflake::try_from(value) {
                    Ok(id) => Some(id),
                    Err(detail) => {
                        spec_errors
                            .push(format!("A channel snowflake must be passed, but {detail}"));
                        None
                    }
                },
            };

            if !spec_errors.is_empty() {
                errors.append(&mut spec_errors);
                continue;
            }
            let (Some(name), Some(channel_id)) = (name, channel_id) else {
                continue;
            };

            match self
                .insert_channel(guild_id, channel_id, &name, position)
                .await
            {
                Ok(row) => created.push(row),
                Err(StorageError::Validation(batch)) => errors.extend(batch),
                Err(other) => errors.push(other.to_string()),
            }
        }

        ensure_valid(errors)?;
        Ok(created)
    }
}
