use colmap::Entity;

#[allow(dead_code)]
#[derive(Entity)]
struct Pair(i64, String);

fn main() {}
