//! Named strategy factories, so a front-end can pick a mapping setup by key.

use std::fmt;

use crate::{MapError, MapResult, MappingConfig};

type Factory = Box<dyn Fn(&mut MappingConfig) -> MapResult<()> + Send + Sync>;

struct CatalogEntry {
    key: String,
    description: String,
    factory: Factory,
}

/// Ordered map from a strategy key to a function that configures it.
#[derive(Default)]
pub struct StrategyCatalog {
    entries: Vec<CatalogEntry>,
}

impl StrategyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory under `key`. Keys are unique; registration order is kept.
    pub fn register<F>(
        &mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        factory: F,
    ) -> MapResult<&mut Self>
    where
        F: Fn(&mut MappingConfig) -> MapResult<()> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.contains(&key) {
            return Err(MapError::configuration(format!(
                "strategy key `{}` is already registered",
                key
            )));
        }
        self.entries.push(CatalogEntry {
            key,
            description: description.into(),
            factory: Box::new(factory),
        });
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// `(key, description)` pairs in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.description.as_str()))
    }

    /// Run the factory registered under `key` against `config`.
    pub fn apply(&self, key: &str, config: &mut MappingConfig) -> MapResult<()> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| MapError::configuration(format!("unknown strategy key `{}`", key)))?;
        #[cfg(feature = "tracing")]
        tracing::info!(key = key, description = %entry.description, "applying mapping strategy");
        (entry.factory)(config)
    }
}

impl fmt::Debug for StrategyCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.key))
            .finish()
    }
}
