#![forbid(unsafe_code)]
//! Built-in mapping strategies.
//!
//! - [`ExplicitMap`]: one type, every property pinned to a column by hand.
//! - [`PrefixFilterConvention`]: ordered rules keyed on declared type and a name predicate.
//! - [`TransformConvention`]: one text transform applied to every property name,
//!   e.g. [`snake_case`].
//!
//! All three implement [`MappingStrategy`] and are registered through
//! [`colmap_core::MappingConfig::configure`]; an [`ExplicitMap`] is bound to
//! its own type and goes through [`colmap_core::MappingConfig::add_map`].

use std::collections::HashMap;
use std::sync::LazyLock;

use colmap_core::{
    DeclaredType, Entity, MapError, MapResult, MappingStrategy, PropertyDescriptor, TypeKey,
};
use regex::Regex;

// --- ExplicitMap ---

/// A fixed property-to-column dictionary for exactly one type.
#[derive(Debug, Clone)]
pub struct ExplicitMap {
    owner: TypeKey,
    properties: &'static [PropertyDescriptor],
    columns: HashMap<&'static str, String>,
}

impl ExplicitMap {
    pub fn for_entity<E: Entity>() -> Self {
        Self::new(E::TYPE, E::PROPERTIES)
    }

    pub fn new(owner: TypeKey, properties: &'static [PropertyDescriptor]) -> Self {
        Self {
            owner,
            properties,
            columns: HashMap::new(),
        }
    }

    /// Pin `property` to `column`. Mapping the same property again replaces
    /// its column.
    pub fn map(mut self, property: &str, column: impl Into<String>) -> MapResult<Self> {
        let column = column.into();
        let properties = self.properties;
        let descriptor = properties
            .iter()
            .find(|p| p.name == property)
            .ok_or_else(|| {
                MapError::configuration(format!(
                    "type `{}` has no property `{}`",
                    self.owner, property
                ))
            })?;
        if column.is_empty() {
            return Err(MapError::configuration(format!(
                "empty column name for `{}.{}`",
                self.owner.name, property
            )));
        }
        if let Some((other, _)) = self
            .columns
            .iter()
            .find(|(name, col)| **name != descriptor.name && **col == column)
        {
            return Err(MapError::configuration(format!(
                "`{}.{}` and `{}.{}` both map to column `{}`",
                self.owner.name, other, self.owner.name, property, column
            )));
        }
        self.columns.insert(descriptor.name, column);
        Ok(self)
    }

    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    pub fn column(&self, property: &str) -> Option<&str> {
        self.columns.get(property).map(String::as_str)
    }
}

impl MappingStrategy for ExplicitMap {
    fn resolve(&self, property: &PropertyDescriptor) -> Option<String> {
        if property.owner != self.owner {
            return None;
        }
        self.columns.get(property.name).cloned()
    }

    fn describe(&self) -> &'static str {
        "explicit-map"
    }

    fn target(&self) -> Option<TypeKey> {
        Some(self.owner)
    }
}

// --- PrefixFilterConvention ---

type Predicate = Box<dyn Fn(&PropertyDescriptor) -> bool + Send + Sync>;

/// One rule of a [`PrefixFilterConvention`]: properties of `declared_type`
/// accepted by the predicate get `column`.
pub struct PropertyRule {
    declared_type: DeclaredType,
    predicate: Option<Predicate>,
    column: String,
}

impl PropertyRule {
    /// Start a rule for properties of `declared_type`.
    pub fn of(declared_type: DeclaredType) -> RuleBuilder {
        RuleBuilder {
            declared_type,
            predicate: None,
        }
    }

    fn matches(&self, property: &PropertyDescriptor) -> bool {
        property.declared_type == self.declared_type
            && self.predicate.as_ref().map_or(true, |p| p(property))
    }
}

impl std::fmt::Debug for PropertyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyRule")
            .field("declared_type", &self.declared_type)
            .field("filtered", &self.predicate.is_some())
            .field("column", &self.column)
            .finish()
    }
}

/// Builder returned by [`PropertyRule::of`].
pub struct RuleBuilder {
    declared_type: DeclaredType,
    predicate: Option<Predicate>,
}

impl RuleBuilder {
    /// Only properties named exactly `name`.
    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.filter(move |p| p.name == name)
    }

    /// Only properties accepted by `predicate`. Replaces any earlier filter.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PropertyDescriptor) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Finish the rule by naming the column matched properties map to.
    pub fn column(self, column: impl Into<String>) -> PropertyRule {
        PropertyRule {
            declared_type: self.declared_type,
            predicate: self.predicate,
            column: column.into(),
        }
    }
}

/// Ordered filter rules; the first matching rule wins, unmatched properties
/// are declined.
///
/// A per-type prefix can be set with [`prefix`](Self::prefix). It is prepended
/// to rule-resolved columns of that declared type only. No prefix is applied
/// unless configured.
#[derive(Debug, Default)]
pub struct PrefixFilterConvention {
    rules: Vec<PropertyRule>,
    prefixes: Vec<(DeclaredType, String)>,
}

impl PrefixFilterConvention {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: PropertyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn prefix(mut self, declared_type: DeclaredType, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        match self.prefixes.iter_mut().find(|(t, _)| *t == declared_type) {
            Some(entry) => entry.1 = prefix,
            None => self.prefixes.push((declared_type, prefix)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl MappingStrategy for PrefixFilterConvention {
    fn resolve(&self, property: &PropertyDescriptor) -> Option<String> {
        let rule = self.rules.iter().find(|r| r.matches(property))?;
        let prefix = self
            .prefixes
            .iter()
            .find(|(t, _)| *t == property.declared_type)
            .map(|(_, p)| p.as_str());
        Some(match prefix {
            Some(p) => format!("{}{}", p, rule.column),
            None => rule.column.clone(),
        })
    }

    fn describe(&self) -> &'static str {
        "prefix-filter-convention"
    }
}

// --- TransformConvention ---

/// Applies one text transform to every property name, no exceptions.
pub struct TransformConvention {
    transform: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl TransformConvention {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            transform: Box::new(transform),
        }
    }

    /// `UserName` -> `user_name`.
    pub fn snake_case() -> Self {
        Self::new(snake_case)
    }
}

impl std::fmt::Debug for TransformConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformConvention").finish_non_exhaustive()
    }
}

impl MappingStrategy for TransformConvention {
    fn resolve(&self, property: &PropertyDescriptor) -> Option<String> {
        Some((self.transform)(property.name))
    }

    fn describe(&self) -> &'static str {
        "transform-convention"
    }
}

/// (1,2): an uppercase letter before an uppercase-lowercase pair (`PSe` in `HTTPServer`).
/// (3,4): a lowercase letter or digit before an uppercase letter (`rN` in `UserName`).
static WORD_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z])([A-Z][a-z])|([a-z0-9])([A-Z])").expect("word boundary pattern")
});

/// Convert a camelCase/PascalCase identifier to snake_case.
///
/// Matches are found left to right without overlap, an underscore is put
/// between the two halves of each match, and the result is lowercased. Runs of
/// capitals therefore split only before their last letter when a lowercase
/// letter follows (`HTTPServer` -> `http_server`, `AB` -> `ab`).
pub fn snake_case(name: &str) -> String {
    WORD_BOUNDARY
        .replace_all(name, "${1}${3}_${2}${4}")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use colmap_core::{MappingConfig, MappingResolver, Scope};

    const USER: TypeKey = TypeKey::new("app::model", "User");
    const OTHER: TypeKey = TypeKey::new("app::model", "Other");
    const USER_PROPS: &[PropertyDescriptor] = &[
        PropertyDescriptor::new("UserId", DeclaredType::I32, USER, false),
        PropertyDescriptor::new("UserName", DeclaredType::String, USER, false),
    ];

    fn user_prefix_convention() -> PrefixFilterConvention {
        PrefixFilterConvention::new()
            .rule(
                PropertyRule::of(DeclaredType::I32)
                    .named("UserId")
                    .column("user_id"),
            )
            .rule(
                PropertyRule::of(DeclaredType::String)
                    .named("UserName")
                    .column("user_name"),
            )
    }

    #[test]
    fn explicit_map_resolves_exactly_what_was_mapped() {
        let map = ExplicitMap::new(USER, USER_PROPS)
            .map("UserId", "user_id")
            .unwrap()
            .map("UserName", "user_name")
            .unwrap();
        assert_eq!(map.resolve(&USER_PROPS[0]).as_deref(), Some("user_id"));
        assert_eq!(map.resolve(&USER_PROPS[1]).as_deref(), Some("user_name"));
        assert_eq!(map.column("UserId"), Some("user_id"));
        assert_eq!(map.target(), Some(USER));
        assert_eq!(map.describe(), "explicit-map");
    }

    #[test]
    fn explicit_map_declines_unmapped_and_foreign_properties() {
        let map = ExplicitMap::new(USER, USER_PROPS)
            .map("UserId", "user_id")
            .unwrap();
        assert_eq!(map.resolve(&USER_PROPS[1]), None);
        let foreign = PropertyDescriptor::new("UserId", DeclaredType::I32, OTHER, false);
        assert_eq!(map.resolve(&foreign), None);
    }

    #[test]
    fn explicit_map_rejects_unknown_property_and_bad_columns() {
        let err = ExplicitMap::new(USER, USER_PROPS)
            .map("Email", "email")
            .expect_err("unknown property");
        assert_eq!(
            err.to_string(),
            "configuration error: type `app::model::User` has no property `Email`"
        );
        assert!(ExplicitMap::new(USER, USER_PROPS).map("UserId", "").is_err());
        let clash = ExplicitMap::new(USER, USER_PROPS)
            .map("UserId", "id")
            .unwrap()
            .map("UserName", "id");
        assert!(clash.is_err());
    }

    #[test]
    fn explicit_map_is_configured_only_for_its_own_type() {
        let map = || {
            ExplicitMap::new(USER, USER_PROPS)
                .map("UserId", "user_id")
                .unwrap()
        };
        let mut config = MappingConfig::new();
        config.register_type(USER).register_type(OTHER);
        assert!(config.configure(map(), Scope::Type(OTHER)).is_err());
        assert!(config.configure(map(), Scope::unit("app::model")).is_err());
        assert!(!config.is_configured(&OTHER));

        config.add_map(map()).unwrap();
        config
            .configure(TransformConvention::snake_case(), Scope::Type(OTHER))
            .unwrap();
        let resolver = MappingResolver::new(config);
        assert_eq!(resolver.resolve_column(&USER_PROPS[0]), "user_id");
    }

    #[test]
    fn explicit_map_remap_replaces_column() {
        let map = ExplicitMap::new(USER, USER_PROPS)
            .map("UserId", "id")
            .unwrap()
            .map("UserId", "user_id")
            .unwrap();
        assert_eq!(map.column("UserId"), Some("user_id"));
    }

    #[test]
    fn prefix_convention_matches_type_and_name() {
        let conv = user_prefix_convention();
        assert_eq!(conv.resolve(&USER_PROPS[0]).as_deref(), Some("user_id"));
        assert_eq!(conv.resolve(&USER_PROPS[1]).as_deref(), Some("user_name"));
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn prefix_convention_requires_declared_type_match() {
        let conv = user_prefix_convention();
        let wrong_type = PropertyDescriptor::new("UserId", DeclaredType::String, USER, false);
        assert_eq!(conv.resolve(&wrong_type), None);
    }

    #[test]
    fn prefix_convention_first_matching_rule_wins() {
        let conv = PrefixFilterConvention::new()
            .rule(
                PropertyRule::of(DeclaredType::I32)
                    .filter(|p| p.name.ends_with("Id"))
                    .column("first"),
            )
            .rule(PropertyRule::of(DeclaredType::I32).column("second"));
        assert_eq!(conv.resolve(&USER_PROPS[0]).as_deref(), Some("first"));
        let count = PropertyDescriptor::new("Count", DeclaredType::I32, USER, false);
        assert_eq!(conv.resolve(&count).as_deref(), Some("second"));
    }

    #[test]
    fn prefix_applies_only_to_its_declared_type() {
        let conv = user_prefix_convention().prefix(DeclaredType::I32, "int");
        assert_eq!(conv.resolve(&USER_PROPS[0]).as_deref(), Some("intuser_id"));
        assert_eq!(conv.resolve(&USER_PROPS[1]).as_deref(), Some("user_name"));
        let unmatched = PropertyDescriptor::new("Age", DeclaredType::I32, USER, false);
        assert_eq!(conv.resolve(&unmatched), None);
    }

    #[test]
    fn transform_literal_cases() {
        assert_eq!(snake_case("UserId"), "user_id");
        assert_eq!(snake_case("UserName"), "user_name");
        assert_eq!(snake_case("A"), "a");
        assert_eq!(snake_case("AB"), "ab");
        assert_eq!(snake_case("aB"), "a_b");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("UserID"), "user_id");
        assert_eq!(snake_case("ABCd"), "ab_cd");
        assert_eq!(snake_case("aBC"), "a_bc");
        assert_eq!(snake_case("Item2Name"), "item2_name");
        assert_eq!(snake_case(""), "");
    }

    #[test]
    fn transform_is_idempotent_on_snake_case() {
        assert_eq!(snake_case("user_id"), "user_id");
        assert_eq!(snake_case(&snake_case("UserName")), "user_name");
    }

    #[test]
    fn transform_convention_applies_to_every_property() {
        let conv = TransformConvention::snake_case();
        assert_eq!(conv.resolve(&USER_PROPS[0]).as_deref(), Some("user_id"));
        let custom = TransformConvention::new(|s| format!("col_{}", s.len()));
        assert_eq!(custom.resolve(&USER_PROPS[1]).as_deref(), Some("col_8"));
    }
}
