//! Mapping registry and the resolver that answers "which column feeds this property?".

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{Entity, FromValue, MapError, MapResult, PropertyDescriptor, RawRecord, TypeKey};

/// Resolves a property to a column name, or declines with `None`.
pub trait MappingStrategy: Send + Sync {
    fn resolve(&self, property: &PropertyDescriptor) -> Option<String>;

    /// Short label used in logs and `Debug` output.
    fn describe(&self) -> &'static str {
        "custom"
    }

    /// The one type this strategy is built for, if it is bound to a type.
    /// A bound strategy can only be configured for exactly that type.
    fn target(&self) -> Option<TypeKey> {
        None
    }
}

impl<F> MappingStrategy for F
where
    F: Fn(&PropertyDescriptor) -> Option<String> + Send + Sync,
{
    fn resolve(&self, property: &PropertyDescriptor) -> Option<String> {
        self(property)
    }
}

/// The set of types a strategy is configured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Exactly one type.
    Type(TypeKey),
    /// Every registered type whose scope is this module path or nested below it.
    Unit(String),
}

impl Scope {
    pub fn entity<E: Entity>() -> Self {
        Scope::Type(E::TYPE)
    }

    pub fn unit(path: impl Into<String>) -> Self {
        Scope::Unit(path.into())
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        match self {
            Scope::Type(k) => k == key,
            Scope::Unit(path) => {
                key.scope == path.as_str()
                    || key
                        .scope
                        .strip_prefix(path.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            }
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Type(key) => write!(f, "type `{}`", key),
            Scope::Unit(path) => write!(f, "unit `{}`", path),
        }
    }
}

/// Registry of candidate types and the strategy assigned to each of them.
///
/// Built once at startup and handed to [`MappingResolver::new`]; the resolver
/// only reads it afterwards.
#[derive(Clone, Default)]
pub struct MappingConfig {
    types: Vec<TypeKey>,
    strategies: HashMap<TypeKey, Arc<dyn MappingStrategy>>,
}

impl MappingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `E` a candidate for unit-scoped strategies.
    pub fn register<E: Entity>(&mut self) -> &mut Self {
        self.register_type(E::TYPE)
    }

    pub fn register_type(&mut self, key: TypeKey) -> &mut Self {
        if !self.types.contains(&key) {
            self.types.push(key);
        }
        self
    }

    pub fn types(&self) -> &[TypeKey] {
        &self.types
    }

    /// Assign `strategy` to every type in `scope`.
    ///
    /// Strategies are mutually exclusive per type: if any targeted type is
    /// already configured, nothing changes and a configuration error is returned.
    pub fn configure<S>(&mut self, strategy: S, scope: Scope) -> MapResult<()>
    where
        S: MappingStrategy + 'static,
    {
        self.configure_shared(Arc::new(strategy), scope)
    }

    /// Configure a type-bound strategy (an explicit map) for its own type.
    pub fn add_map<S>(&mut self, strategy: S) -> MapResult<()>
    where
        S: MappingStrategy + 'static,
    {
        let target = strategy.target().ok_or_else(|| {
            MapError::configuration(format!(
                "{} is not bound to a type; configure it with a scope",
                strategy.describe()
            ))
        })?;
        self.configure(strategy, Scope::Type(target))
    }

    pub fn configure_shared(
        &mut self,
        strategy: Arc<dyn MappingStrategy>,
        scope: Scope,
    ) -> MapResult<()> {
        if let Some(target) = strategy.target() {
            if scope != Scope::Type(target) {
                return Err(MapError::configuration(format!(
                    "{} is bound to `{}` and cannot be configured for {}",
                    strategy.describe(),
                    target,
                    scope
                )));
            }
        }
        let targets: Vec<TypeKey> = match &scope {
            Scope::Type(key) => vec![*key],
            Scope::Unit(_) => self
                .types
                .iter()
                .filter(|k| scope.contains(k))
                .copied()
                .collect(),
        };
        if targets.is_empty() {
            return Err(MapError::configuration(format!(
                "no registered type in {}",
                scope
            )));
        }
        if let Some(taken) = targets.iter().find(|k| self.strategies.contains_key(*k)) {
            return Err(MapError::configuration(format!(
                "type `{}` already has a mapping strategy",
                taken
            )));
        }

        for key in targets {
            self.register_type(key);
            self.strategies.insert(key, Arc::clone(&strategy));
            #[cfg(feature = "tracing")]
            tracing::info!(
                type_name = %key,
                strategy = strategy.describe(),
                "mapping strategy configured"
            );
        }
        Ok(())
    }

    pub fn strategy_for(&self, key: &TypeKey) -> Option<&dyn MappingStrategy> {
        self.strategies.get(key).map(|s| s.as_ref())
    }

    pub fn is_configured(&self, key: &TypeKey) -> bool {
        self.strategies.contains_key(key)
    }
}

impl fmt::Debug for MappingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in &self.types {
            let label = self.strategies.get(key).map(|s| s.describe());
            map.entry(&key.to_string(), &label);
        }
        map.finish()
    }
}

/// The resolved association between one property and its column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub property: PropertyDescriptor,
    pub column: String,
}

/// All bindings of one type, in property order. Column names are non-empty
/// and unique within the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSet {
    owner: TypeKey,
    bindings: Vec<ColumnBinding>,
}

impl BindingSet {
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    pub fn column(&self, property_name: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.property.name == property_name)
            .map(|b| b.column.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Answers per-property column lookups and materializes raw records.
pub struct MappingResolver {
    config: MappingConfig,
    binding_cache: Mutex<HashMap<TypeId, Arc<BindingSet>>>,
}

impl MappingResolver {
    pub fn new(config: MappingConfig) -> Self {
        Self {
            config,
            binding_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Column name for `property`. Falls back to the property name when the
    /// owner type has no strategy or the strategy declines.
    pub fn resolve_column(&self, property: &PropertyDescriptor) -> String {
        let resolved = self
            .config
            .strategy_for(&property.owner)
            .and_then(|s| s.resolve(property));
        match resolved {
            Some(column) => column,
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    type_name = %property.owner,
                    property = property.name,
                    "identity mapping"
                );
                property.name.to_string()
            }
        }
    }

    /// Bindings for every property of `E`, computed once and cached.
    ///
    /// The cache is keyed by the Rust type, so two structs sharing a
    /// [`TypeKey`] still get their own binding sets.
    pub fn bindings<E: Entity>(&self) -> MapResult<Arc<BindingSet>> {
        let mut guard = self
            .binding_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(set) = guard.get(&TypeId::of::<E>()) {
            return Ok(Arc::clone(set));
        }
        let built = Arc::new(self.bindings_for(E::TYPE, E::PROPERTIES)?);
        guard.insert(TypeId::of::<E>(), Arc::clone(&built));
        Ok(built)
    }

    /// Resolve and validate bindings for `properties` without caching.
    pub fn bindings_for(
        &self,
        owner: TypeKey,
        properties: &[PropertyDescriptor],
    ) -> MapResult<BindingSet> {
        let mut bindings: Vec<ColumnBinding> = Vec::with_capacity(properties.len());
        for property in properties {
            let column = self.resolve_column(property);
            if column.is_empty() {
                return Err(MapError::configuration(format!(
                    "property `{}` of `{}` resolved to an empty column name",
                    property.name, owner
                )));
            }
            if let Some(clash) = bindings.iter().find(|b| b.column == column) {
                return Err(MapError::configuration(format!(
                    "properties `{}` and `{}` of `{}` both map to column `{}`",
                    clash.property.name, property.name, owner, column
                )));
            }
            bindings.push(ColumnBinding {
                property: *property,
                column,
            });
        }
        Ok(BindingSet { owner, bindings })
    }

    /// Build one `E` from `record`.
    pub fn materialize_row<E: Entity>(&self, record: &RawRecord) -> MapResult<E> {
        let bindings = self.bindings::<E>()?;
        E::materialize(&RowReader::new(record, &bindings))
    }

    /// Materialize every record. Fails as a whole only when the bindings of
    /// `E` are invalid; row failures are reported per row.
    pub fn materialize_all<E: Entity>(
        &self,
        records: &[RawRecord],
    ) -> MapResult<Vec<MapResult<E>>> {
        let bindings = self.bindings::<E>()?;
        Ok(records
            .iter()
            .map(|record| E::materialize(&RowReader::new(record, &bindings)))
            .collect())
    }
}

impl fmt::Debug for MappingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reads property values out of one raw record through a binding set.
pub struct RowReader<'a> {
    record: &'a RawRecord,
    bindings: &'a BindingSet,
}

impl<'a> RowReader<'a> {
    pub fn new(record: &'a RawRecord, bindings: &'a BindingSet) -> Self {
        Self { record, bindings }
    }

    /// The bound column of `property`. A property outside the binding set is
    /// a configuration error.
    pub fn column(&self, property: &PropertyDescriptor) -> MapResult<&'a str> {
        self.bindings.column(property.name).ok_or_else(|| {
            MapError::configuration(format!(
                "property `{}` is not bound for `{}`",
                property.name,
                self.bindings.owner()
            ))
        })
    }

    /// Read a required property (or an `Option`, which defaults to `None`).
    pub fn read<T: FromValue>(&self, property: &PropertyDescriptor) -> MapResult<T> {
        let column = self.column(property)?;
        match self.record.get(column) {
            Some(value) => T::from_value(value)
                .map_err(|e| materialization_error(property, column, e.to_string())),
            None => T::missing().ok_or_else(|| {
                materialization_error(property, column, "column not present in record")
            }),
        }
    }

    /// Read a property that falls back to `T::default()` when its column is absent.
    pub fn read_or_default<T>(&self, property: &PropertyDescriptor) -> MapResult<T>
    where
        T: FromValue + Default,
    {
        let column = self.column(property)?;
        match self.record.get(column) {
            Some(value) => T::from_value(value)
                .map_err(|e| materialization_error(property, column, e.to_string())),
            None => Ok(T::default()),
        }
    }
}

fn materialization_error(
    property: &PropertyDescriptor,
    column: &str,
    reason: impl Into<String>,
) -> MapError {
    MapError::Materialization {
        type_name: property.owner.name.to_string(),
        property: property.name.to_string(),
        column: column.to_string(),
        reason: reason.into(),
    }
}
