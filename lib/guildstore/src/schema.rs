//! Declarative table schemas and the validation pipeline.
//!
//! A [`Schema`] describes one table: its columns, the per-column flags that
//! drive validation and statement generation, and an ordered pipeline of
//! validation passes. Schemas are constructed once through
//! [`SchemaBuilder`], checked for self-consistency, and immutable afterward,
//! so they are safe for unlimited concurrent reads.

use crate::{ColumnType, Record, Snowflake, StorageError, Value};

/// A validation pass. Receives the proposed record and whether it should be
/// treated as a set of updates (some columns may be omitted) or a new record
/// (every non-nullable column must be present). Returns zero or more
/// human-readable error strings.
pub type Validator = Box<dyn Fn(&Record, bool) -> Vec<String> + Send + Sync>;

/// One column of a table, with the flags that drive validation.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    required: bool,
    nullable: bool,
    immutable: bool,
    automatic: bool,
    update_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
            nullable: false,
            immutable: false,
            automatic: false,
            update_key: false,
        }
    }

    /// Must be present on every update.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// May be omitted when a record is created.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Never appears in a SET clause; identifies rows for update and delete.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Value is produced by this layer, never accepted as user input.
    pub fn automatic(mut self) -> Self {
        self.automatic = true;
        self
    }

    /// Used in the WHERE clause of an UPDATE. Must also be immutable.
    pub fn update_key(mut self) -> Self {
        self.update_key = true;
        self
    }
}

/// Builder for [`Schema`]. `build` rejects malformed descriptions
/// immediately rather than letting them surface as bad statements later.
pub struct SchemaBuilder {
    name: String,
    columns: Vec<Column>,
    validators: Vec<Validator>,
    permit_nulls: bool,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            validators: Vec::new(),
            permit_nulls: false,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a schema-specific validation pass. Custom passes run after the
    /// two built-in passes, in registration order.
    pub fn validator(
        mut self,
        validator: impl Fn(&Record, bool) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Permit explicit nulls for present columns.
    pub fn permit_nulls(mut self) -> Self {
        self.permit_nulls = true;
        self
    }

    pub fn build(self) -> Result<Schema, StorageError> {
        if self.name.is_empty() {
            return Err(StorageError::Schema("table name must not be empty".into()));
        }
        if self.columns.is_empty() {
            return Err(StorageError::Schema(format!(
                "table {} must declare at least one column",
                self.name
            )));
        }
        for (index, column) in self.columns.iter().enumerate() {
            if self.columns[..index].iter().any(|c| c.name == column.name) {
                return Err(StorageError::Schema(format!(
                    "table {} declares column {} more than once",
                    self.name, column.name
                )));
            }
            if column.update_key && !column.immutable {
                return Err(StorageError::Schema(format!(
                    "update key column {} of table {} must be immutable",
                    column.name, self.name
                )));
            }
        }
        if !self.columns.iter().any(|c| c.immutable) {
            return Err(StorageError::Schema(format!(
                "table {} must declare an immutable identity column",
                self.name
            )));
        }

        Ok(Schema {
            name: self.name,
            columns: self.columns,
            validators: self.validators,
            permit_nulls: self.permit_nulls,
        })
    }
}

/// Declarative description of one table. See the module docs.
pub struct Schema {
    name: String,
    columns: Vec<Column>,
    validators: Vec<Validator>,
    permit_nulls: bool,
}

impl Schema {
    /// The statement target (table) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All column names, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns that must be present on every update.
    pub fn requireds(&self) -> impl Iterator<Item = &str> {
        self.flagged(|c| c.required)
    }

    /// Columns that may be omitted on creation.
    pub fn nullables(&self) -> impl Iterator<Item = &str> {
        self.flagged(|c| c.nullable)
    }

    /// Columns that never appear in a SET clause.
    pub fn immutables(&self) -> impl Iterator<Item = &str> {
        self.flagged(|c| c.immutable)
    }

    /// Columns whose values are generated by this layer.
    pub fn automatics(&self) -> impl Iterator<Item = &str> {
        self.flagged(|c| c.automatic)
    }

    /// Columns used in the WHERE clause of an UPDATE.
    pub fn update_keys(&self) -> impl Iterator<Item = &str> {
        self.flagged(|c| c.update_key)
    }

    /// Columns that may appear in a SET clause (keys minus immutables).
    pub fn updatables(&self) -> impl Iterator<Item = &str> {
        self.flagged(|c| !c.immutable)
    }

    pub fn permit_nulls(&self) -> bool {
        self.permit_nulls
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.column_type)
    }

    pub(crate) fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn is_immutable(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| c.immutable)
    }

    fn flagged(&self, flag: impl Fn(&Column) -> bool) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(move |c| flag(c))
            .map(|c| c.name.as_str())
    }

    fn immutable_list(&self) -> String {
        self.immutables().collect::<Vec<_>>().join(", ")
    }

    /// Drop every column the schema does not declare.
    pub fn trim(&self, record: &Record) -> Record {
        self.columns
            .iter()
            .filter_map(|c| record.get(&c.name).map(|v| (c.name.clone(), v.clone())))
            .collect()
    }

    /// Replace decimal-string text in identifier columns with the internal
    /// form. Unparseable text is left in place for the type pass to report.
    pub fn coerce_identifiers(&self, mut record: Record) -> Record {
        for column in self.columns.iter().filter(|c| c.column_type == ColumnType::Id) {
            let parsed = match record.get(&column.name) {
                Some(Value::Text(s)) => s.parse::<Snowflake>().ok(),
                _ => None,
            };
            if let Some(id) = parsed {
                record.set(column.name.clone(), id);
            }
        }
        record
    }

    /// Run every validation pass in order and concatenate the error strings.
    /// Never short-circuits, so a caller sees every problem at once.
    pub fn validate(&self, record: &Record, is_update: bool) -> Vec<String> {
        let mut errors = self.check_missing_keys(record, is_update);
        errors.extend(self.check_types(record));
        for validator in &self.validators {
            errors.extend(validator(record, is_update));
        }
        errors
    }

    fn check_missing_keys(&self, record: &Record, is_update: bool) -> Vec<String> {
        let mut errors = Vec::new();

        if is_update {
            for key in self.requireds() {
                if !record.contains(key) {
                    errors.push(format!(
                        "Key {key} is required for an update, but was not supplied"
                    ));
                }
            }
            if !self.permit_nulls {
                for key in self.keys() {
                    if record.get(key).is_some_and(Value::is_null) {
                        errors.push(format!(
                            "Key {key} is required for an update, but null was supplied"
                        ));
                    }
                }
            }
            // an update that changes nothing is rejected
            if self.updatables().all(|key| !record.contains(key)) {
                errors.push(format!(
                    "At least one key besides [{}] must be supplied for an update, but none were",
                    self.immutable_list()
                ));
            }
        } else {
            for column in &self.columns {
                match record.get(&column.name) {
                    None if !column.nullable => errors.push(format!(
                        "Key {} is required for a new record, but was not supplied",
                        column.name
                    )),
                    Some(Value::Null) if !self.permit_nulls => errors.push(format!(
                        "Key {} must not be null, but null was supplied",
                        column.name
                    )),
                    _ => {}
                }
            }
        }

        errors
    }

    fn check_types(&self, record: &Record) -> Vec<String> {
        let mut errors = Vec::new();
        for column in &self.columns {
            if let Some(value) = record.get(&column.name)
                && let Some(actual) = value.column_type()
                && actual != column.column_type
            {
                errors.push(format!(
                    "Key {} must be of type {}, but the supplied value {} is of type {}",
                    column.name,
                    column.column_type.name(),
                    value,
                    actual.name()
                ));
            }
        }
        errors
    }
}
