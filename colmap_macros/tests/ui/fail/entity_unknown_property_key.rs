use colmap::Entity;

#[allow(dead_code)]
#[derive(Entity)]
struct Account {
    #[property(rename = "id")]
    account_id: i64,
}

fn main() {}
