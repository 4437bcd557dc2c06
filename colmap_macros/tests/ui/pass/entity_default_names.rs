use colmap::{DeclaredType, Entity};

#[derive(Entity, Clone, Debug, PartialEq)]
struct User {
    user_id: i32,
    user_name: String,
    nickname: Option<String>,
}

fn main() {
    assert_eq!(User::TYPE.name, "User");
    assert_eq!(User::TYPE.scope, module_path!());
    let names: Vec<_> = User::PROPERTIES.iter().map(|p| p.name).collect();
    assert_eq!(names, ["UserId", "UserName", "Nickname"]);
    assert_eq!(User::PROPERTIES[0].declared_type, DeclaredType::I32);
    assert_eq!(User::PROPERTIES[1].declared_type, DeclaredType::String);
    assert!(!User::PROPERTIES[1].has_default);
    assert!(User::PROPERTIES[2].has_default);
}
