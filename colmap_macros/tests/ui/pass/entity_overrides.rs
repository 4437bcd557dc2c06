use colmap::{Entity, MappingConfig, MappingResolver, RawRecord};

#[derive(Entity, Clone, Debug, PartialEq)]
#[entity(name = "Account", scope = "billing::model")]
struct AccountRow {
    #[property(name = "ID")]
    id: i64,
    #[property(default)]
    balance: f64,
    #[property(skip)]
    cached: Vec<String>,
}

fn main() {
    assert_eq!(AccountRow::TYPE.to_string(), "billing::model::Account");
    let names: Vec<_> = AccountRow::PROPERTIES.iter().map(|p| p.name).collect();
    assert_eq!(names, ["ID", "Balance"]);

    let resolver = MappingResolver::new(MappingConfig::new());
    let row: AccountRow = resolver
        .materialize_row(&RawRecord::new().with("ID", 7i64))
        .unwrap();
    assert_eq!(
        row,
        AccountRow {
            id: 7,
            balance: 0.0,
            cached: Vec::new(),
        }
    );
}
