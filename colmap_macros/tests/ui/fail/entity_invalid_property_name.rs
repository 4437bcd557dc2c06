use colmap::Entity;

#[allow(dead_code)]
#[derive(Entity)]
struct Account {
    #[property(name = "account-id")]
    account_id: i64,
}

fn main() {}
