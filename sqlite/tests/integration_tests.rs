//! Integration tests for the quiver-sqlite crate.

use quiver_core::{Element, ErrorKind, TimeSeries, Value};
use quiver_sqlite::{Database, DatabaseOptions};

const SCHEMA: &str = "
PRAGMA user_version = 1;
PRAGMA foreign_keys = ON;

CREATE TABLE Configuration (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    value_scale REAL NOT NULL DEFAULT 1
);

CREATE TABLE Cost (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT UNIQUE NOT NULL,
    value REAL NOT NULL DEFAULT 0
);

CREATE TABLE Plant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT UNIQUE NOT NULL,
    capacity REAL NOT NULL DEFAULT 0,
    main_cost_id INTEGER,
    FOREIGN KEY(main_cost_id) REFERENCES Cost(id) ON DELETE SET NULL ON UPDATE CASCADE
);

CREATE TABLE Plant_vector_costs (
    id INTEGER,
    vector_index INTEGER NOT NULL,
    costs REAL NOT NULL,
    PRIMARY KEY (id, vector_index),
    FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE Plant_vector_cost_relation (
    id INTEGER,
    vector_index INTEGER NOT NULL,
    cost_id INTEGER,
    weight REAL,
    PRIMARY KEY (id, vector_index),
    FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE,
    FOREIGN KEY(cost_id) REFERENCES Cost(id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE Plant_set_units (
    id INTEGER,
    unit_name TEXT NOT NULL,
    unit_factor REAL NOT NULL DEFAULT 1,
    FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE Plant_set_cost_pool (
    id INTEGER,
    pool_cost_id INTEGER,
    share REAL,
    FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE,
    FOREIGN KEY(pool_cost_id) REFERENCES Cost(id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE Plant_time_series_generation (
    id INTEGER,
    date_time TEXT NOT NULL,
    block INTEGER NOT NULL DEFAULT 1,
    generation REAL,
    FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE Plant_time_series_files (
    generation TEXT
);

CREATE TABLE Resource (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT UNIQUE NOT NULL
);

CREATE TABLE Resource_vector_profile (
    id INTEGER,
    vector_index INTEGER NOT NULL,
    v1 REAL,
    v2 REAL,
    PRIMARY KEY (id, vector_index),
    FOREIGN KEY(id) REFERENCES Resource(id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE Resource_time_series_g1 (
    id INTEGER,
    date_time TEXT NOT NULL,
    v REAL,
    FOREIGN KEY(id) REFERENCES Resource(id) ON DELETE CASCADE ON UPDATE CASCADE
);
";

fn memory_db() -> Database {
    Database::from_schema_sql(":memory:", SCHEMA, DatabaseOptions::default()).unwrap()
}

fn create_plant(db: &Database, label: &str, capacity: f64, costs: Vec<f64>) -> i64 {
    let mut plant = Element::new();
    plant
        .set("label", label)
        .set("capacity", capacity)
        .set("costs", costs);
    db.create_element("Plant", &plant).unwrap()
}

fn count(db: &Database, table: &str) -> i64 {
    db.execute(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .unwrap()
        .scalar()
        .unwrap()
        .as_integer()
        .unwrap()
}

#[test]
fn basic_create_and_read() {
    let db = memory_db();
    let id = create_plant(&db, "P1", 50.0, vec![1.0, 2.0, 3.0]);

    let group = db.read_element_vector_group("Plant", id, "costs").unwrap();
    assert_eq!(
        group,
        vec![(
            "costs".to_string(),
            vec![Value::Real(1.0), Value::Real(2.0), Value::Real(3.0)]
        )]
    );

    let capacity = db.read_scalar_by_label("Plant", "capacity", "P1").unwrap();
    assert_eq!(capacity, Value::Real(50.0));
}

#[test]
fn scalar_round_trip_preserves_values() {
    let db = memory_db();
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("capacity", 12.5)
        .set_null("main_cost_id");
    let id = db.create_element("Plant", &plant).unwrap();

    let attrs = db.read_element_scalar_attributes("Plant", id).unwrap();
    let names: Vec<&str> = attrs.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["id", "label", "capacity", "main_cost_id"]);
    assert_eq!(attrs[0].1, Value::Integer(id));
    assert_eq!(attrs[1].1, Value::Text("P1".into()));
    assert_eq!(attrs[2].1, Value::Real(12.5));
    assert_eq!(attrs[3].1, Value::Null);
}

#[test]
fn integer_promotes_into_real_column() {
    let db = memory_db();
    let mut plant = Element::new();
    plant.set("label", "P1").set("capacity", 50i64);
    db.create_element("Plant", &plant).unwrap();

    let capacity = db.read_scalar_by_label("Plant", "capacity", "P1").unwrap();
    // SQLite stores the integer affinity-converted into the REAL column.
    assert_eq!(capacity.as_real().unwrap(), 50.0);
}

#[test]
fn fk_by_label_resolves_vector_relation_ids() {
    let db = memory_db();
    let mut cost = Element::new();
    cost.set("label", "Cost 1").set("value", 10.0);
    db.create_element("Cost", &cost).unwrap();
    let mut cost = Element::new();
    cost.set("label", "Cost 2").set("value", 20.0);
    db.create_element("Cost", &cost).unwrap();

    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("cost_id", vec!["Cost 2", "Cost 1"]);
    let id = db.create_element("Plant", &plant).unwrap();

    let group = db
        .read_element_vector_group("Plant", id, "cost_relation")
        .unwrap();
    assert_eq!(
        group,
        vec![
            (
                "cost_id".to_string(),
                vec![Value::Integer(2), Value::Integer(1)]
            ),
            ("weight".to_string(), vec![Value::Null, Value::Null]),
        ]
    );
}

#[test]
fn fk_by_label_with_unknown_label_fails() {
    let db = memory_db();
    let mut plant = Element::new();
    plant.set("label", "P1").set("cost_id", vec!["No Such Cost"]);
    let err = db.create_element("Plant", &plant).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ForeignKeyViolation);
    assert_eq!(count(&db, "Plant"), 0);
}

#[test]
fn fk_by_label_without_declared_fk_is_type_mismatch() {
    let db = memory_db();
    // capacity is REAL with no foreign key; text is not accepted.
    let mut plant = Element::new();
    plant.set("label", "P1").set("capacity", "not a number");
    let err = db.create_element("Plant", &plant).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn unequal_vector_lengths_roll_back_everything() {
    let db = memory_db();
    let mut resource = Element::new();
    resource
        .set("label", "R1")
        .set("v1", vec![1.0])
        .set("v2", vec![1.0, 2.0]);
    let err = db.create_element("Resource", &resource).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidValue);

    assert_eq!(count(&db, "Resource"), 0);
    assert_eq!(count(&db, "Resource_vector_profile"), 0);
}

#[test]
fn cascade_delete_removes_side_table_rows() {
    let db = memory_db();
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("capacity", 1.0)
        .set("costs", vec![1.0, 2.0, 3.0])
        .set("unit_name", vec!["a", "b"])
        .set("unit_factor", vec![1.0, 2.0]);
    db.create_element("Plant", &plant).unwrap();

    assert_eq!(count(&db, "Plant_vector_costs"), 3);
    assert_eq!(count(&db, "Plant_set_units"), 2);

    db.delete_element("Plant", "P1").unwrap();

    assert!(db.read_scalar("Plant", "label").unwrap().is_empty());
    assert_eq!(count(&db, "Plant_vector_costs"), 0);
    assert_eq!(count(&db, "Plant_set_units"), 0);
}

#[test]
fn invalid_fk_actions_fail_schema_load() {
    let err = Database::from_schema_sql(
        ":memory:",
        "CREATE TABLE Y (id INTEGER PRIMARY KEY, label TEXT UNIQUE NOT NULL);
         CREATE TABLE X (
             id INTEGER PRIMARY KEY,
             label TEXT UNIQUE NOT NULL,
             y_id INTEGER,
             FOREIGN KEY(y_id) REFERENCES Y(id) ON DELETE CASCADE ON UPDATE SET NULL
         );",
        DatabaseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidSchema);
    assert!(err.message.contains("ON UPDATE"));
}

#[test]
fn time_series_round_trip_with_point_update() {
    let db = memory_db();
    let mut series = TimeSeries::new();
    series
        .add_column("date_time", vec!["2020-01-01", "2021-01-01"])
        .add_column("v", vec![1.0, 2.0]);

    let mut resource = Element::new();
    resource.set("label", "R1");
    resource.set_time_series("g1", series);
    let id = db.create_element("Resource", &resource).unwrap();

    db.update_time_series_row("Resource", "v", "R1", 10.0, "2021-01-01")
        .unwrap();

    let rows = db
        .read_element_time_series_group("Resource", id, "g1", &["date_time"])
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        vec![
            ("date_time".to_string(), Value::Text("2020-01-01".into())),
            ("v".to_string(), Value::Real(1.0)),
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            ("date_time".to_string(), Value::Text("2021-01-01".into())),
            ("v".to_string(), Value::Real(10.0)),
        ]
    );
}

#[test]
fn update_time_series_row_requires_existing_key() {
    let db = memory_db();
    let mut resource = Element::new();
    resource.set("label", "R1");
    db.create_element("Resource", &resource).unwrap();

    let err = db
        .update_time_series_row("Resource", "v", "R1", 10.0, "1999-01-01")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ElementNotFound);
}

#[test]
fn delete_time_series_clears_group_rows() {
    let db = memory_db();
    let mut series = TimeSeries::new();
    series
        .add_column("date_time", vec!["2020-01-01"])
        .add_column("v", vec![1.0]);
    let mut resource = Element::new();
    resource.set("label", "R1");
    resource.set_time_series("g1", series);
    let id = db.create_element("Resource", &resource).unwrap();

    db.delete_time_series("Resource", "g1", "R1").unwrap();
    let rows = db
        .read_element_time_series_group("Resource", id, "g1", &[])
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn set_group_preserves_multiset_of_rows() {
    let db = memory_db();
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("unit_name", vec!["b", "a"])
        .set("unit_factor", vec![2.0, 1.0]);
    let id = db.create_element("Plant", &plant).unwrap();

    let mut rows = db.read_element_set_group("Plant", id, "units").unwrap();
    rows.sort_by_key(|row| format!("{row:?}"));
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&vec![
        ("unit_name".to_string(), Value::Text("a".into())),
        ("unit_factor".to_string(), Value::Real(1.0)),
    ]));
    assert!(rows.contains(&vec![
        ("unit_name".to_string(), Value::Text("b".into())),
        ("unit_factor".to_string(), Value::Real(2.0)),
    ]));
}

#[test]
fn vector_preserves_order_and_length() {
    let db = memory_db();
    let input: Vec<f64> = (0..10).map(|i| i as f64 * 1.5).collect();
    let id = create_plant(&db, "P1", 0.0, input.clone());

    let vector = db.read_vector_by_label("Plant", "costs", "P1").unwrap();
    assert_eq!(vector.len(), input.len());
    for (i, value) in vector.iter().enumerate() {
        assert_eq!(value, &Value::Real(input[i]));
    }

    // Missing group is an error, empty group is not.
    let err = db.read_element_vector_group("Plant", id, "ghost").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AttributeNotFound);
    let empty = db
        .read_element_vector_group("Plant", id, "cost_relation")
        .unwrap();
    assert_eq!(
        empty,
        vec![("cost_id".to_string(), vec![]), ("weight".to_string(), vec![])]
    );
}

#[test]
fn read_scalar_orders_by_insertion() {
    let db = memory_db();
    create_plant(&db, "Zeta", 1.0, vec![]);
    create_plant(&db, "Alpha", 2.0, vec![]);

    let labels = db.read_scalar("Plant", "label").unwrap();
    assert_eq!(
        labels,
        vec![Value::Text("Zeta".into()), Value::Text("Alpha".into())]
    );
}

#[test]
fn duplicate_label_is_unique_violation() {
    let db = memory_db();
    create_plant(&db, "P1", 1.0, vec![]);
    let mut plant = Element::new();
    plant.set("label", "P1");
    let err = db.create_element("Plant", &plant).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UniqueViolation);
}

#[test]
fn empty_element_is_rejected() {
    let db = memory_db();
    let err = db.create_element("Plant", &Element::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::EmptyElement);
}

#[test]
fn unknown_attribute_is_rejected() {
    let db = memory_db();
    let mut plant = Element::new();
    plant.set("label", "P1").set("wattage", 1.0);
    let err = db.create_element("Plant", &plant).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AttributeNotFound);
    assert_eq!(count(&db, "Plant"), 0);
}

#[test]
fn scalar_attribute_rejects_vector_value() {
    let db = memory_db();
    let mut plant = Element::new();
    plant.set("label", "P1").set("capacity", vec![1.0]);
    let err = db.create_element("Plant", &plant).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn blob_is_accepted_for_any_column_type() {
    let db = memory_db();
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("capacity", Value::Blob(vec![1, 2, 3]));
    db.create_element("Plant", &plant).unwrap();

    let stored = db.read_scalar_by_label("Plant", "capacity", "P1").unwrap();
    assert_eq!(stored, Value::Blob(vec![1, 2, 3]));
}

#[test]
fn update_scalar_parameter_by_label() {
    let db = memory_db();
    create_plant(&db, "P1", 1.0, vec![]);
    db.update_scalar_parameter("Plant", "capacity", "P1", 99.5)
        .unwrap();
    assert_eq!(
        db.read_scalar_by_label("Plant", "capacity", "P1").unwrap(),
        Value::Real(99.5)
    );
}

#[test]
fn update_vector_parameters_replaces_in_place() {
    let db = memory_db();
    create_plant(&db, "P1", 1.0, vec![1.0, 2.0, 3.0]);
    db.update_vector_parameters(
        "Plant",
        "costs",
        "P1",
        &[Value::Real(9.0), Value::Real(8.0), Value::Real(7.0)],
    )
    .unwrap();
    assert_eq!(
        db.read_vector_by_label("Plant", "costs", "P1").unwrap(),
        vec![Value::Real(9.0), Value::Real(8.0), Value::Real(7.0)]
    );
}

#[test]
fn update_vector_parameters_rejects_resize() {
    let db = memory_db();
    create_plant(&db, "P1", 1.0, vec![1.0, 2.0, 3.0]);
    let err = db
        .update_vector_parameters("Plant", "costs", "P1", &[Value::Real(9.0)])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidValue);
    // Unchanged after the failed update.
    assert_eq!(
        db.read_vector_by_label("Plant", "costs", "P1").unwrap(),
        vec![Value::Real(1.0), Value::Real(2.0), Value::Real(3.0)]
    );
}

#[test]
fn update_set_parameters_replaces_rows() {
    let db = memory_db();
    let mut plant = Element::new();
    plant.set("label", "P1").set("unit_name", vec!["a", "b", "c"]);
    db.create_element("Plant", &plant).unwrap();

    db.update_set_parameters(
        "Plant",
        "unit_name",
        "P1",
        &[Value::Text("x".into()), Value::Text("y".into())],
    )
    .unwrap();

    let mut values: Vec<String> = db
        .read_set_by_label("Plant", "unit_name", "P1")
        .unwrap()
        .iter()
        .map(|v| v.as_text().unwrap().to_string())
        .collect();
    values.sort();
    assert_eq!(values, ["x", "y"]);
}

#[test]
fn scalar_relation_is_idempotent() {
    let db = memory_db();
    let mut cost = Element::new();
    cost.set("label", "Cost 1");
    db.create_element("Cost", &cost).unwrap();
    create_plant(&db, "P1", 1.0, vec![]);

    db.set_scalar_relation("Plant", "Cost", "P1", "Cost 1", "main_cost_id")
        .unwrap();
    db.set_scalar_relation("Plant", "Cost", "P1", "Cost 1", "main_cost_id")
        .unwrap();

    let relations = db
        .read_scalar_relations("Plant", "Cost", "main_cost_id")
        .unwrap();
    assert_eq!(relations, vec![Some("Cost 1".to_string())]);
}

#[test]
fn vector_relation_orders_children() {
    let db = memory_db();
    for label in ["Cost 1", "Cost 2", "Cost 3"] {
        let mut cost = Element::new();
        cost.set("label", label);
        db.create_element("Cost", &cost).unwrap();
    }
    create_plant(&db, "P1", 1.0, vec![]);

    db.set_vector_relation("Plant", "Cost", "P1", &["Cost 3", "Cost 1"], "cost_id")
        .unwrap();

    let relations = db.read_vector_relations("Plant", "Cost", "cost_id").unwrap();
    assert_eq!(relations, vec![vec!["Cost 3".to_string(), "Cost 1".to_string()]]);

    // Replacing is not appending.
    db.set_vector_relation("Plant", "Cost", "P1", &["Cost 2"], "cost_id")
        .unwrap();
    let relations = db.read_vector_relations("Plant", "Cost", "cost_id").unwrap();
    assert_eq!(relations, vec![vec!["Cost 2".to_string()]]);
}

#[test]
fn vector_relation_preserves_sibling_columns() {
    let db = memory_db();
    for label in ["Cost 1", "Cost 2"] {
        let mut cost = Element::new();
        cost.set("label", label);
        db.create_element("Cost", &cost).unwrap();
    }
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("cost_id", vec!["Cost 1", "Cost 2"])
        .set("weight", vec![0.5, 0.7]);
    let id = db.create_element("Plant", &plant).unwrap();

    // Same child count: rows are rewritten in place.
    db.set_vector_relation("Plant", "Cost", "P1", &["Cost 2", "Cost 1"], "cost_id")
        .unwrap();
    let group = db
        .read_element_vector_group("Plant", id, "cost_relation")
        .unwrap();
    assert_eq!(
        group,
        vec![
            (
                "cost_id".to_string(),
                vec![Value::Integer(2), Value::Integer(1)]
            ),
            ("weight".to_string(), vec![Value::Real(0.5), Value::Real(0.7)]),
        ]
    );

    // Shrinking trims the tail row; the survivor keeps its weight.
    db.set_vector_relation("Plant", "Cost", "P1", &["Cost 1"], "cost_id")
        .unwrap();
    let group = db
        .read_element_vector_group("Plant", id, "cost_relation")
        .unwrap();
    assert_eq!(
        group,
        vec![
            ("cost_id".to_string(), vec![Value::Integer(1)]),
            ("weight".to_string(), vec![Value::Real(0.5)]),
        ]
    );
}

#[test]
fn set_relation_preserves_sibling_columns() {
    let db = memory_db();
    for label in ["Cost 1", "Cost 2"] {
        let mut cost = Element::new();
        cost.set("label", label);
        db.create_element("Cost", &cost).unwrap();
    }
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("pool_cost_id", vec!["Cost 1"])
        .set("share", vec![0.25]);
    let id = db.create_element("Plant", &plant).unwrap();

    db.set_set_relation("Plant", "Cost", "P1", &["Cost 2"], "pool_cost_id")
        .unwrap();
    let rows = db.read_element_set_group("Plant", id, "cost_pool").unwrap();
    assert_eq!(
        rows,
        vec![vec![
            ("pool_cost_id".to_string(), Value::Integer(2)),
            ("share".to_string(), Value::Real(0.25)),
        ]]
    );

    // Growing appends a row; the existing row is untouched.
    db.set_set_relation("Plant", "Cost", "P1", &["Cost 1", "Cost 2"], "pool_cost_id")
        .unwrap();
    let rows = db.read_element_set_group("Plant", id, "cost_pool").unwrap();
    assert_eq!(
        rows,
        vec![
            vec![
                ("pool_cost_id".to_string(), Value::Integer(1)),
                ("share".to_string(), Value::Real(0.25)),
            ],
            vec![
                ("pool_cost_id".to_string(), Value::Integer(2)),
                ("share".to_string(), Value::Null),
            ],
        ]
    );
}

#[test]
fn update_set_parameters_preserves_sibling_columns() {
    let db = memory_db();
    let mut plant = Element::new();
    plant
        .set("label", "P1")
        .set("unit_name", vec!["a", "b"])
        .set("unit_factor", vec![1.0, 2.0]);
    let id = db.create_element("Plant", &plant).unwrap();

    db.update_set_parameters(
        "Plant",
        "unit_name",
        "P1",
        &[Value::Text("x".into()), Value::Text("y".into())],
    )
    .unwrap();

    let rows = db.read_element_set_group("Plant", id, "units").unwrap();
    assert_eq!(
        rows,
        vec![
            vec![
                ("unit_name".to_string(), Value::Text("x".into())),
                ("unit_factor".to_string(), Value::Real(1.0)),
            ],
            vec![
                ("unit_name".to_string(), Value::Text("y".into())),
                ("unit_factor".to_string(), Value::Real(2.0)),
            ],
        ]
    );
}

#[test]
fn set_relation_stores_children() {
    let db = memory_db();
    for label in ["Cost 1", "Cost 2"] {
        let mut cost = Element::new();
        cost.set("label", label);
        db.create_element("Cost", &cost).unwrap();
    }
    create_plant(&db, "P1", 1.0, vec![]);

    db.set_set_relation("Plant", "Cost", "P1", &["Cost 2", "Cost 1"], "pool_cost_id")
        .unwrap();

    let mut relations = db
        .read_set_relations("Plant", "Cost", "pool_cost_id")
        .unwrap();
    relations[0].sort();
    assert_eq!(relations, vec![vec!["Cost 1".to_string(), "Cost 2".to_string()]]);
}

#[test]
fn relation_requires_declared_foreign_key() {
    let db = memory_db();
    create_plant(&db, "P1", 1.0, vec![]);
    let err = db
        .set_scalar_relation("Plant", "Cost", "P1", "Cost 1", "capacity")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn time_series_file_sidecar_upserts() {
    let db = memory_db();
    assert_eq!(db.read_time_series_file("Plant", "generation").unwrap(), None);

    db.set_time_series_file("Plant", "generation", "data/gen.csv")
        .unwrap();
    assert_eq!(
        db.read_time_series_file("Plant", "generation").unwrap(),
        Some("data/gen.csv".to_string())
    );

    db.set_time_series_file("Plant", "generation", "data/gen2.csv")
        .unwrap();
    assert_eq!(
        db.read_time_series_file("Plant", "generation").unwrap(),
        Some("data/gen2.csv".to_string())
    );
    // Still a one-row sidecar.
    assert_eq!(count(&db, "Plant_time_series_files"), 1);
}

#[test]
fn compare_identical_databases_is_empty() {
    let a = memory_db();
    let b = memory_db();
    for db in [&a, &b] {
        create_plant(db, "P1", 50.0, vec![1.0, 2.0]);
    }
    assert!(a.compare_databases(&b).unwrap().is_empty());
    assert!(a.compare_databases(&a).unwrap().is_empty());
}

#[test]
fn compare_reports_scalar_difference_symmetrically() {
    let a = memory_db();
    let b = memory_db();
    create_plant(&a, "P1", 50.0, vec![]);
    create_plant(&b, "P1", 60.0, vec![]);

    let forward = a.compare_databases(&b).unwrap();
    assert_eq!(forward.len(), 1);
    assert!(forward[0].contains("attribute 'capacity'"));
    assert!(forward[0].contains("side A has 50"));
    assert!(forward[0].contains("side B has 60"));

    let backward = b.compare_databases(&a).unwrap();
    assert_eq!(backward.len(), 1);
    assert!(backward[0].contains("side A has 60"));
    assert!(backward[0].contains("side B has 50"));
}

#[test]
fn compare_is_deterministic_and_sorted() {
    let a = memory_db();
    let b = memory_db();
    create_plant(&a, "P1", 1.0, vec![1.0]);
    create_plant(&a, "P2", 2.0, vec![2.0]);
    create_plant(&b, "P1", 9.0, vec![9.0]);
    create_plant(&b, "P3", 3.0, vec![3.0]);

    let first = a.compare_databases(&b).unwrap();
    let second = a.compare_databases(&b).unwrap();
    assert_eq!(first, second);

    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted);
    assert!(first.iter().any(|d| d.contains("'P2' only in side A")));
    assert!(first.iter().any(|d| d.contains("'P3' only in side B")));
}

#[test]
fn compare_vector_difference_lists_both_sides() {
    let a = memory_db();
    let b = memory_db();
    create_plant(&a, "P1", 1.0, vec![1.0, 2.0]);
    create_plant(&b, "P1", 1.0, vec![1.0, 5.0]);

    let diffs = a.compare_vector_parameters(&b, "Plant").unwrap();
    assert_eq!(diffs.len(), 1);
    assert!(diffs[0].contains("[1, 2]"));
    assert!(diffs[0].contains("[1, 5]"));
}

#[test]
fn compare_time_series_files_difference() {
    let a = memory_db();
    let b = memory_db();
    create_plant(&a, "P1", 1.0, vec![]);
    create_plant(&b, "P1", 1.0, vec![]);
    a.set_time_series_file("Plant", "generation", "a.csv").unwrap();
    b.set_time_series_file("Plant", "generation", "b.csv").unwrap();

    let diffs = a.compare_time_series_files(&b, "Plant").unwrap();
    assert_eq!(diffs.len(), 1);
    assert!(diffs[0].contains("a.csv"));
    assert!(diffs[0].contains("b.csv"));
}

#[test]
fn from_migrations_builds_and_reuses_database() {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let root = std::env::temp_dir().join(format!("quiver-int-migrations-{nanos}"));
    let migrations = root.join("migrations");
    std::fs::create_dir_all(migrations.join("1")).unwrap();
    std::fs::write(
        migrations.join("1").join("001_init.sql"),
        "CREATE TABLE Plant (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             label TEXT UNIQUE NOT NULL,
             capacity REAL NOT NULL DEFAULT 0
         );",
    )
    .unwrap();
    std::fs::create_dir_all(migrations.join("2")).unwrap();
    std::fs::write(
        migrations.join("2").join("001_costs.sql"),
        "CREATE TABLE Plant_vector_costs (
             id INTEGER,
             vector_index INTEGER NOT NULL,
             costs REAL NOT NULL,
             PRIMARY KEY (id, vector_index),
             FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE
         );",
    )
    .unwrap();

    let db_path = root.join("plants.db");
    let db = Database::from_migrations(&db_path, &migrations, DatabaseOptions::default()).unwrap();
    assert_eq!(db.current_version().unwrap(), 2);
    create_plant(&db, "P1", 1.0, vec![1.0]);
    drop(db);

    // Reopening applies nothing new and sees the data.
    let db = Database::from_migrations(&db_path, &migrations, DatabaseOptions::default()).unwrap();
    assert_eq!(db.current_version().unwrap(), 2);
    assert_eq!(db.element_ids("Plant").unwrap(), [1]);

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn configuration_is_not_a_collection() {
    let db = memory_db();
    let collections = db.collections().unwrap();
    assert_eq!(collections, ["Cost", "Plant", "Resource"]);
    assert_eq!(db.vector_groups("Plant").unwrap(), ["costs", "cost_relation"]);
    assert_eq!(db.set_groups("Plant").unwrap(), ["units", "cost_pool"]);
    assert_eq!(db.time_series_groups("Plant").unwrap(), ["generation"]);
}

#[test]
fn delete_unknown_element_is_not_found() {
    let db = memory_db();
    let err = db.delete_element("Plant", "ghost").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ElementNotFound);
    let err = db.delete_element("Plant", 42i64).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ElementNotFound);
}

#[test]
fn create_element_nests_under_caller_transaction() {
    let db = memory_db();
    db.begin_transaction().unwrap();
    create_plant(&db, "P1", 1.0, vec![1.0]);
    db.rollback().unwrap();
    assert_eq!(count(&db, "Plant"), 0);
    assert_eq!(count(&db, "Plant_vector_costs"), 0);
}
