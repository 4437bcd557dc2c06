#![forbid(unsafe_code)]
//! Facade crate re-exporting the core types, the built-in strategies, and the
//! `Entity` derive of the `colmap` library.
//!
//! Add this single crate as a dependency; enable `libsql-backend` to get the
//! file-database executor and migration runner under [`backends`].
//!
//! # Example: explicit mapping
//!
//! ```
//! use colmap::{Entity, ExplicitMap, MappingConfig, MappingResolver, RawRecord};
//!
//! // Properties are exposed as `UserId` and `UserName`.
//! #[derive(Entity, Debug, PartialEq)]
//! struct User {
//!     user_id: i32,
//!     user_name: String,
//! }
//!
//! let map = ExplicitMap::for_entity::<User>()
//!     .map("UserId", "user_id")?
//!     .map("UserName", "user_name")?;
//!
//! let mut config = MappingConfig::new();
//! config.add_map(map)?;
//! let resolver = MappingResolver::new(config);
//!
//! let record = RawRecord::new().with("user_id", 1).with("user_name", "hoge");
//! let user: User = resolver.materialize_row(&record)?;
//! assert_eq!(user, User { user_id: 1, user_name: "hoge".into() });
//! # Ok::<(), colmap::MapError>(())
//! ```

// Re-export the core model, resolver and errors.
pub use colmap_core::{
    async_trait, fetch_all, BindingSet, ColumnBinding, ConversionError, DeclaredType, Entity,
    FromValue, MapError, MapResult, MappingConfig, MappingResolver, MappingStrategy,
    PropertyDescriptor, QueryExecutor, RawRecord, RowReader, Scope, StrategyCatalog, TypeKey,
    Value,
};

// Re-export the derive macro.
pub use colmap_macros::Entity;

// Re-export the built-in strategies.
pub use colmap_conventions::{
    snake_case, ExplicitMap, PrefixFilterConvention, PropertyRule, RuleBuilder,
    TransformConvention,
};

// Backend executors re-exported under a neutral namespace, so end-users don't
// have to depend on backend crates directly.
pub mod backends {
    #[cfg(feature = "libsql-backend")]
    pub use colmap_libsql::{LibsqlExecutor, Migration, MigrationRunner};
}
