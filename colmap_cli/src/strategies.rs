//! The menu of mapping setups offered by the console.

use colmap::{
    DeclaredType, Entity, ExplicitMap, MapResult, MappingConfig, PrefixFilterConvention,
    PropertyRule, Scope, StrategyCatalog, TransformConvention,
};

use crate::model::User;

/// Root module of this binary; option 3 covers everything under it.
const CRATE_UNIT: &str = env!("CARGO_CRATE_NAME");

pub fn catalog() -> MapResult<StrategyCatalog> {
    let mut catalog = StrategyCatalog::new();
    catalog
        .register("1", "explicit map for User", explicit_user_map)?
        .register(
            "2",
            "filter-rule convention over the model module",
            model_unit_convention,
        )?
        .register(
            "3",
            "snake_case transform over the whole crate",
            crate_snake_case,
        )?;
    Ok(catalog)
}

fn register_entities(config: &mut MappingConfig) {
    config.register::<User>();
}

fn explicit_user_map(config: &mut MappingConfig) -> MapResult<()> {
    let map = ExplicitMap::for_entity::<User>()
        .map("UserId", "user_id")?
        .map("UserName", "user_name")?;
    config.add_map(map)
}

fn model_unit_convention(config: &mut MappingConfig) -> MapResult<()> {
    register_entities(config);
    let convention = PrefixFilterConvention::new()
        .rule(
            PropertyRule::of(DeclaredType::I32)
                .named("UserId")
                .column("user_id"),
        )
        .rule(
            PropertyRule::of(DeclaredType::String)
                .named("UserName")
                .column("user_name"),
        );
    config.configure(convention, Scope::unit(User::TYPE.scope))
}

fn crate_snake_case(config: &mut MappingConfig) -> MapResult<()> {
    register_entities(config);
    config.configure(TransformConvention::snake_case(), Scope::unit(CRATE_UNIT))
}
