use colmap::Entity;

#[allow(dead_code)]
#[derive(Entity)]
struct Wrapper<T> {
    value: T,
}

fn main() {}
