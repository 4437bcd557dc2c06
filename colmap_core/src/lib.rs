#![forbid(unsafe_code)]
//! Core types for the colmap mapping library.
//!
//! This crate knows nothing about a concrete database. It describes entity
//! properties, decides which column feeds each property, and turns raw
//! field-name/value records into entities.

// Re-export for downstream executor implementations.
pub use async_trait::async_trait;

pub mod catalog;
pub mod resolver;

pub use catalog::StrategyCatalog;
pub use resolver::{
    BindingSet, ColumnBinding, MappingConfig, MappingResolver, MappingStrategy, RowReader, Scope,
};

use std::fmt;

/// Identifies an entity type: its name plus the code-organization unit
/// (module path) that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    pub scope: &'static str,
    pub name: &'static str,
}

impl TypeKey {
    pub const fn new(scope: &'static str, name: &'static str) -> Self {
        Self { scope, name }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            f.write_str(self.name)
        } else {
            write!(f, "{}::{}", self.scope, self.name)
        }
    }
}

/// The declared Rust type of a property, as far as mapping rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    I32,
    I64,
    F64,
    Bool,
    String,
    Bytes,
    Other(&'static str),
}

/// Describes one property of an entity type.
/// Produced once per type by `#[derive(Entity)]` and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub declared_type: DeclaredType,
    pub owner: TypeKey,
    /// Whether materialization may fill the property when its column is absent.
    pub has_default: bool,
}

impl PropertyDescriptor {
    pub const fn new(
        name: &'static str,
        declared_type: DeclaredType,
        owner: TypeKey,
        has_default: bool,
    ) -> Self {
        Self {
            name,
            declared_type,
            owner,
            has_default,
        }
    }
}

/// A raw field value as handed over by a query executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Short name of the stored kind, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

/// One row as returned by a query executor: field names in result order.
/// Lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, Value)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. On duplicate names the first one wins on lookup.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// Failure to convert a raw value into a property type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("integer {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },
}

/// Conversion from a raw [`Value`] into a property type.
pub trait FromValue: Sized {
    const DECLARED_TYPE: DeclaredType;

    fn from_value(value: &Value) -> Result<Self, ConversionError>;

    /// Value used when the record has no field for the property.
    /// `None` means the property is required.
    fn missing() -> Option<Self> {
        None
    }
}

fn mismatch<T>(expected: &'static str, found: &Value) -> Result<T, ConversionError> {
    Err(ConversionError::Mismatch {
        expected,
        found: found.kind(),
    })
}

impl FromValue for i64 {
    const DECLARED_TYPE: DeclaredType = DeclaredType::I64;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => mismatch("integer", other),
        }
    }
}

impl FromValue for i32 {
    const DECLARED_TYPE: DeclaredType = DeclaredType::I32;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => i32::try_from(*i).map_err(|_| ConversionError::OutOfRange {
                value: *i,
                target: "i32",
            }),
            other => mismatch("integer", other),
        }
    }
}

impl FromValue for f64 {
    const DECLARED_TYPE: DeclaredType = DeclaredType::F64;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            other => mismatch("real", other),
        }
    }
}

impl FromValue for bool {
    const DECLARED_TYPE: DeclaredType = DeclaredType::Bool;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        // SQLite stores booleans as 0/1
        match value {
            Value::Integer(i) => Ok(*i != 0),
            other => mismatch("integer", other),
        }
    }
}

impl FromValue for String {
    const DECLARED_TYPE: DeclaredType = DeclaredType::String;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => mismatch("text", other),
        }
    }
}

impl FromValue for Vec<u8> {
    const DECLARED_TYPE: DeclaredType = DeclaredType::Bytes;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            other => mismatch("blob", other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const DECLARED_TYPE: DeclaredType = T::DECLARED_TYPE;
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
    fn missing() -> Option<Self> {
        Some(None)
    }
}

/// An entity type whose properties can be mapped to columns.
/// Implemented via `#[derive(Entity)]` in `colmap_macros`.
pub trait Entity: Sized + 'static {
    const TYPE: TypeKey;
    const PROPERTIES: &'static [PropertyDescriptor];

    /// Build an instance, reading each property through `reader`.
    fn materialize(reader: &RowReader<'_>) -> MapResult<Self>;
}

/// Error type for configuration, materialization and executor failures.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Invalid or conflicting mapping configuration.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
    /// A raw record could not be turned into an entity.
    #[error("cannot materialize {type_name}.{property} from column `{column}`: {reason}")]
    Materialization {
        type_name: String,
        property: String,
        column: String,
        reason: String,
    },
    /// Opaque error from the query executor or its driver.
    #[error("query error")]
    Query {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A schema migration step failed.
    #[error("migration {version} failed")]
    Migration {
        version: i64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MapError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        MapError::Configuration {
            reason: reason.into(),
        }
    }

    /// Wrap an executor/driver error.
    pub fn query<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MapError::Query {
            source: Box::new(e),
        }
    }

    /// Wrap an error raised while applying migration `version`.
    pub fn migration<E>(version: i64, e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MapError::Migration {
            version,
            source: Box::new(e),
        }
    }
}

/// Convenience alias for results returned by mapping operations.
pub type MapResult<T> = Result<T, MapError>;

/// Executes a raw SQL statement and returns the fetched rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str) -> MapResult<Vec<RawRecord>>;
}

/// Run `sql` and materialize every returned row as `E`.
///
/// The outer result fails only when the query itself fails; each row carries
/// its own result so callers decide whether a bad row is fatal.
pub async fn fetch_all<E, X>(
    executor: &X,
    resolver: &MappingResolver,
    sql: &str,
) -> MapResult<Vec<MapResult<E>>>
where
    E: Entity,
    X: QueryExecutor + ?Sized,
{
    let records = executor.query(sql).await?;
    resolver.materialize_all::<E>(&records)
}
