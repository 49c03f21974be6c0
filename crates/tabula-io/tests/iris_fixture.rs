//! Integration tests over the bundled fixtures in tests/fixtures/.

use std::path::PathBuf;

use approx::assert_relative_eq;
use tabula_core::{
    ClassSpec, DomainBasicAttrStat, DomainDistributions, Key, RandomIndicesCv, Value,
    VariableRegistry,
};
use tabula_io::{ReaderConfig, load_table, read_baskets_from_path, read_table_from_path, save_table};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn iris(registry: &mut VariableRegistry) -> tabula_core::Table {
    read_table_from_path(fixture("iris.tab"), &ReaderConfig::default(), registry)
        .unwrap_or_else(|e| panic!("failed to read iris.tab: {e}"))
}

#[test]
fn iris_reads_with_header_types() {
    let mut registry = VariableRegistry::new();
    let table = iris(&mut registry);
    assert_eq!(table.len(), 150);
    let domain = table.domain();
    assert_eq!(domain.attributes().len(), 4);
    let class = domain.class_var().expect("class");
    assert_eq!(class.name(), "iris");
    assert_eq!(
        class.values(),
        vec!["Iris-setosa", "Iris-versicolor", "Iris-virginica"]
    );
}

#[test]
fn class_distribution_is_balanced() {
    let mut registry = VariableRegistry::new();
    let table = iris(&mut registry);
    let mut distributions = DomainDistributions::from_table(&table, false, false, false)
        .expect("distributions");
    distributions.normalize();
    let class = distributions
        .get(4)
        .and_then(|d| d.as_discrete())
        .expect("class distribution");
    for p in class.counts() {
        assert_relative_eq!(*p, 1.0 / 3.0, epsilon = 1e-12);
    }

    let stats = DomainBasicAttrStat::from_table(&table, false).expect("stats");
    let petal = stats.get(2).expect("petal length");
    assert_eq!(petal.n, 150.0);
    assert!(petal.min < petal.max);
    assert!(stats.get(4).is_none());
}

#[test]
fn projected_view_writes_reach_the_source() {
    let mut registry = VariableRegistry::new();
    let table = iris(&mut registry);
    let view = table
        .translate_keys(&[Key::from(0usize), Key::from(1usize)], ClassSpec::None)
        .expect("projection");
    assert_eq!(view.domain().len(), 2);
    assert_eq!(view.len(), 150);

    view.set(7, 1usize, Value::Continuous(9.5)).expect("write");
    assert_eq!(
        table.get(7, "sepal width").expect("read"),
        Value::Continuous(9.5)
    );
}

#[test]
fn cross_validation_folds_partition_iris() {
    let mut registry = VariableRegistry::new();
    let table = iris(&mut registry);
    let folds = RandomIndicesCv::new(10)
        .seed(42)
        .indices_for(&table)
        .expect("folds");
    let mut covered = 0;
    for fold in 0..10 {
        let test = table.sample(&folds, fold, false).expect("sample");
        assert_eq!(test.len(), 15);
        covered += test.len();
    }
    assert_eq!(covered, 150);
}

#[test]
fn snapshot_reload_shares_the_registry_variables() {
    let mut registry = VariableRegistry::new();
    let table = iris(&mut registry);
    let path = std::env::temp_dir().join(format!("tabula-io-iris-{}.json", std::process::id()));
    save_table(&path, &table).expect("save");

    let loaded = load_table(&path, &mut registry).expect("load");
    assert_eq!(loaded.domain().variables(), table.domain().variables());
    assert_eq!(loaded.ids(), table.ids());
    for row in [0, 49, 50, 149] {
        assert_eq!(loaded.values(row).expect("row"), table.values(row).expect("row"));
    }
    let _ = std::fs::remove_file(path);
}

#[test]
fn grocery_baskets() {
    let mut registry = VariableRegistry::new();
    let baskets = read_baskets_from_path(fixture("groceries.basket"), &mut registry, None)
        .expect("baskets");
    assert_eq!(baskets.len(), 4);
    assert_eq!(baskets.domain().metas().len(), 6);
    assert_eq!(baskets.get(1, "eggs").expect("eggs"), Value::Continuous(12.0));
    assert_eq!(baskets.get(3, "bread").expect("bread"), Value::Undefined);
}
