#![allow(unexpected_cfgs)]
//! Common integration testing utilities and generic scenarios reusable across executors.

use async_trait::async_trait;
use colmap::{
    fetch_all, DeclaredType, Entity, ExplicitMap, MappingConfig, MappingResolver,
    PrefixFilterConvention, PropertyRule, QueryExecutor, Scope, TransformConvention,
};
use colmap_core::{MapError, MapResult};

pub mod model {
    use colmap::Entity;

    /// Row shape of `user_table`. Exposes properties `UserId` and `UserName`.
    #[derive(Entity, Clone, Debug, PartialEq)]
    pub struct User {
        pub user_id: i32,
        pub user_name: String,
    }
}

pub use model::User;

/// Expose migration SQL via constants for harnesses.
pub mod migrations {
    pub const LIBSQL_USER_TABLE_SQL: &str =
        include_str!("../migrations/libsql/001_user_table.sql");
    pub const LIBSQL_SEED_USERS_SQL: &str =
        include_str!("../migrations/libsql/002_seed_users.sql");
}

/// Query every scenario runs.
pub const SELECT_USERS: &str = "SELECT * FROM user_table ORDER BY user_id";

/// The two seeded users, in `user_id` order.
pub fn seeded_users() -> Vec<User> {
    vec![
        User {
            user_id: 1,
            user_name: "hoge".into(),
        },
        User {
            user_id: 2,
            user_name: "fuga".into(),
        },
    ]
}

#[async_trait]
pub trait ExecutorFactory {
    /// Construct an executor connected to a DB holding the seeded `user_table`.
    async fn new_user_executor(&self) -> MapResult<Box<dyn QueryExecutor>>;
}

/// Explicit property-to-column map for [`User`].
pub fn configure_explicit(config: &mut MappingConfig) -> MapResult<()> {
    let map = ExplicitMap::for_entity::<User>()
        .map("UserId", "user_id")?
        .map("UserName", "user_name")?;
    config.add_map(map)
}

/// Filter rules over the unit containing [`User`].
pub fn configure_prefix_filter(config: &mut MappingConfig) -> MapResult<()> {
    config.register::<User>();
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

/// Snake-case transform over the unit containing [`User`].
pub fn configure_snake_case(config: &mut MappingConfig) -> MapResult<()> {
    config.register::<User>();
    config.configure(TransformConvention::snake_case(), Scope::unit(User::TYPE.scope))
}

async fn fetch_users<F: ExecutorFactory + Sync>(
    f: &F,
    config: MappingConfig,
) -> MapResult<Vec<MapResult<User>>> {
    let executor = f.new_user_executor().await?;
    let resolver = MappingResolver::new(config);
    fetch_all::<User, _>(executor.as_ref(), &resolver, SELECT_USERS).await
}

async fn assert_mapped_with<F: ExecutorFactory + Sync>(
    f: &F,
    configure: fn(&mut MappingConfig) -> MapResult<()>,
) -> MapResult<()> {
    let mut config = MappingConfig::new();
    configure(&mut config)?;
    let users = fetch_users(f, config)
        .await?
        .into_iter()
        .collect::<MapResult<Vec<_>>>()?;
    assert_eq!(users, seeded_users());
    Ok(())
}

/// Without any strategy, `UserId` is looked up verbatim and every row fails.
pub async fn test_unmapped_rows_fail<F: ExecutorFactory + Sync>(f: &F) -> MapResult<()> {
    let results = fetch_users(f, MappingConfig::new()).await?;
    assert_eq!(results.len(), 2);
    for result in results {
        match result {
            Err(MapError::Materialization { column, .. }) => assert_eq!(column, "UserId"),
            other => panic!("expected materialization failure, got {other:?}"),
        }
    }
    Ok(())
}

pub async fn test_explicit_map<F: ExecutorFactory + Sync>(f: &F) -> MapResult<()> {
    assert_mapped_with(f, configure_explicit).await
}

pub async fn test_prefix_filter_convention<F: ExecutorFactory + Sync>(f: &F) -> MapResult<()> {
    assert_mapped_with(f, configure_prefix_filter).await
}

pub async fn test_snake_case_convention<F: ExecutorFactory + Sync>(f: &F) -> MapResult<()> {
    assert_mapped_with(f, configure_snake_case).await
}
