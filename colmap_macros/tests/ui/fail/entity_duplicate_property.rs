use colmap::Entity;

#[allow(dead_code)]
#[derive(Entity)]
struct Account {
    account_id: i64,
    #[property(name = "AccountId")]
    legacy_id: i64,
}

fn main() {}
