use colmap::Entity;
use serde::Serialize;

/// A row of `user_table`. Properties are `UserId` and `UserName`; the
/// columns are snake_case, so nothing maps without a strategy.
#[derive(Entity, Serialize, Clone, Debug, PartialEq)]
pub struct User {
    pub user_id: i32,
    pub user_name: String,
}
