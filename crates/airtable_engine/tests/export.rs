use std::fs;

use airtable_core::{assemble, CoercionOptions, DelimitedOptions, JsonOptions, RawPayload, Table};
use airtable_engine::{export_delimited, export_json, ExportError};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn table() -> Table {
    let raw = json!({
        "columns": [
            {"id": "fldName", "name": "Name", "type": "text"},
            {"id": "fldDone", "name": "Done", "type": "checkbox"}
        ],
        "rows": [
            {"id": "rec1", "cellValuesByColumnId": {"fldName": "Task A"}},
            {"id": "rec2", "cellValuesByColumnId": {"fldName": "Task B", "fldDone": true}}
        ]
    });
    let payload = RawPayload::from_table(200, Vec::new(), &raw).unwrap();
    assemble(&payload, &CoercionOptions::default())
}

#[test]
fn without_path_text_is_returned() {
    let text = export_delimited(&table(), &DelimitedOptions::default(), None).unwrap();
    assert_eq!(text.as_deref(), Some("Name,Done\nTask A,False\nTask B,True\n"));
}

#[test]
fn with_path_file_is_written_and_nothing_returned() {
    let temp = TempDir::new().unwrap();
    let csv_path = temp.path().join("tasks.csv");
    let json_path = temp.path().join("exports").join("tasks.JSON");

    assert_eq!(
        export_delimited(&table(), &DelimitedOptions::default(), Some(csv_path.as_path())).unwrap(),
        None
    );
    assert_eq!(
        export_json(&table(), &JsonOptions::default(), Some(json_path.as_path())).unwrap(),
        None
    );

    assert_eq!(
        fs::read_to_string(&csv_path).unwrap(),
        "Name,Done\nTask A,False\nTask B,True\n"
    );
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(
        written,
        json!([{"Name": "Task A", "Done": false}, {"Name": "Task B", "Done": true}])
    );
}

#[test]
fn writing_twice_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tasks.tsv");
    let options = DelimitedOptions::tsv();

    export_delimited(&table(), &options, Some(path.as_path())).unwrap();
    let first = fs::read(&path).unwrap();
    export_delimited(&table(), &options, Some(path.as_path())).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
fn wrong_extension_is_rejected_before_writing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tasks.xlsx");

    let err = export_delimited(&table(), &DelimitedOptions::default(), Some(path.as_path())).unwrap_err();
    assert!(matches!(err, ExportError::WrongExtension { .. }));
    assert!(!path.exists());

    let err = export_json(&table(), &JsonOptions::default(), Some(temp.path().join("tasks").as_path())).unwrap_err();
    assert!(matches!(err, ExportError::WrongExtension { .. }));
}

#[test]
fn unwritable_destination_is_propagated() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    fs::write(&blocker, "x").unwrap();

    let err = export_json(
        &table(),
        &JsonOptions::default(),
        Some(blocker.join("tasks.json").as_path()),
    )
    .unwrap_err();
    assert!(matches!(err, ExportError::Persist(_)));
}
