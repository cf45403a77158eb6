mod common;

use std::sync::{Arc, Mutex};

use common::{TestWorkspace, east_west_rows};
use pivot_workbench::{
    aggregate::Aggregation,
    data::Dataset,
    flatten::ExpansionState,
    pivot::{PivotDimensionField, PivotSpec, PivotValueField, SortOrder, compute_pivot},
    saved::SavedPivot,
    store::{PivotStore, PivotUpdate, StoreError, StoreEvent},
};

fn spec() -> PivotSpec {
    PivotSpec {
        rows: vec![PivotDimensionField {
            order: SortOrder::Desc,
            show_totals: true,
            ..PivotDimensionField::new("Region")
        }],
        values: vec![PivotValueField::new("Sales", Aggregation::Sum)],
        ..PivotSpec::default()
    }
}

#[test]
fn saved_pivot_survives_snapshot_with_default_settings() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("workbench.json");

    let mut store = PivotStore::new();
    let dataset_id = store.add_dataset(Dataset::from_rows("sales", east_west_rows()));
    let pivot_id = store
        .add_pivot(SavedPivot::from_spec(&dataset_id, None, &spec()))
        .unwrap();
    store.save_snapshot(&path).unwrap();

    let reloaded = PivotStore::load_snapshot(&path).unwrap();
    let saved = reloaded.pivot(&pivot_id).unwrap();
    assert_eq!(saved.title, "Region by Sales (sum)");

    let restored_spec = saved.to_spec();
    assert_eq!(restored_spec.rows[0].order, SortOrder::Asc);
    assert!(!restored_spec.rows[0].show_totals);

    let dataset = reloaded.dataset(&saved.dataset_id).unwrap();
    let table = compute_pivot(&dataset.data, &restored_spec, &ExpansionState::new());
    let labels = table.rows.iter().map(|n| n.label.as_str()).collect::<Vec<_>>();
    assert_eq!(labels, vec!["East", "West"]);
    assert_eq!(table.rows[0].values.get(0, 0), Some(15.0));
}

#[test]
fn snapshot_json_uses_camel_case_records() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("workbench.json");
    let mut store = PivotStore::new();
    let dataset_id = store.add_dataset(Dataset::from_rows("sales", east_west_rows()));
    store
        .add_pivot(SavedPivot::from_spec(&dataset_id, Some("Regional"), &spec()))
        .unwrap();
    store.save_snapshot(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["datasets"][0]["rowCount"], 3);
    assert_eq!(json["datasets"][0]["schema"]["Sales"], "number");
    assert_eq!(json["datasets"][0]["data"][0]["Sales"], 10.0);
    assert_eq!(json["pivots"][0]["title"], "Regional");
    assert_eq!(json["pivots"][0]["filters"], serde_json::json!([]));
}

#[test]
fn cascade_delete_notifies_with_removed_pivots() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut store = PivotStore::new();
    let sink = Arc::clone(&events);
    store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    let dataset_id = store.add_dataset(Dataset::from_rows("sales", east_west_rows()));
    let first = store
        .add_pivot(SavedPivot::from_spec(&dataset_id, None, &spec()))
        .unwrap();
    let second = store
        .add_pivot(SavedPivot::from_spec(&dataset_id, Some("Copy"), &spec()))
        .unwrap();
    store.delete_dataset(&dataset_id).unwrap();

    assert!(store.pivots().is_empty());
    let last = events.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last, StoreEvent::DatasetDeleted(dataset_id, vec![first, second]));
}

#[test]
fn missing_records_are_typed_errors() {
    let mut store = PivotStore::new();
    assert!(matches!(
        store.delete_dataset("nope"),
        Err(StoreError::DatasetNotFound(_))
    ));
    assert!(matches!(
        store.delete_pivot("nope"),
        Err(StoreError::PivotNotFound(_))
    ));
    assert!(matches!(
        store.update_pivot("nope", PivotUpdate::default()),
        Err(StoreError::PivotNotFound(_))
    ));
    assert!(store.set_active_dataset(Some("nope")).is_err());
    store.set_active_dataset(None).unwrap();
}

#[test]
fn corrupt_snapshot_reports_format_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("broken.json", "{ not json");
    assert!(matches!(
        PivotStore::load_snapshot(&path),
        Err(StoreError::Json(_))
    ));
}

#[cfg(target_os = "linux")]
#[test]
fn failed_snapshot_write_is_reported() {
    let mut store = PivotStore::new();
    store.add_dataset(Dataset::from_rows("sales", east_west_rows()));
    let result = store.save_snapshot(std::path::Path::new("/dev/full"));
    assert!(matches!(result, Err(StoreError::Io(_))));
}

#[test]
fn snapshot_into_missing_directory_is_io_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("missing").join("workbench.json");
    assert!(matches!(
        PivotStore::new().save_snapshot(&path),
        Err(StoreError::Io(_))
    ));
}
