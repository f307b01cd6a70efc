use airtable_core::{
    assemble, parse_delimited, schema_summary, to_delimited_string, to_json_string, to_mapping,
    CellValue, CoercionOptions, ColumnData, DelimitedOptions, Frame, JsonOptions, MappingError,
    Orientation, RawPayload, Table,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn mixed_table() -> Table {
    let table = json!({
        "columns": [
            {"id": "fldName", "name": "Name", "type": "text"},
            {"id": "fldQty", "name": "Qty", "type": "number"},
            {"id": "fldDue", "name": "Due", "type": "date"},
            {"id": "fldTags", "name": "Tags", "type": "multiSelect", "typeOptions": {"choices": {
                "selR": {"id": "selR", "name": "red"},
                "selG": {"id": "selG", "name": "green"}
            }}},
            {"id": "fldDone", "name": "Done", "type": "checkbox"}
        ],
        "rows": [
            {"id": "rec1", "cellValuesByColumnId": {
                "fldName": "Widget, large", "fldQty": 3, "fldDue": "2024-02-29",
                "fldTags": ["selR", "selG"], "fldDone": true
            }},
            {"id": "rec2", "cellValuesByColumnId": {
                "fldName": "Say \"hi\"", "fldQty": 1.5
            }}
        ]
    });
    let payload = RawPayload::from_table(200, Vec::new(), &table).unwrap();
    assemble(&payload, &CoercionOptions::default())
}

#[test]
fn delimited_output_reparses_to_same_fields() {
    let table = mixed_table();
    let text = to_delimited_string(&table, &DelimitedOptions::default());
    let records = parse_delimited(&text, ',');

    assert_eq!(
        records,
        vec![
            vec!["Name", "Qty", "Due", "Tags", "Done"],
            vec!["Widget, large", "3", "2024-02-29", "red,green", "True"],
            vec!["Say \"hi\"", "1.5", "", "", "False"],
        ]
    );
}

#[test]
fn delimited_options_change_rendering() {
    let table = mixed_table();
    let options = DelimitedOptions {
        joiner: "|".into(),
        true_text: "yes".into(),
        false_text: "no".into(),
        include_header: false,
        ..DelimitedOptions::tsv()
    };
    let text = to_delimited_string(&table, &options);
    assert_eq!(
        text,
        "Widget, large\t3\t2024-02-29\tred|green\tyes\n\"Say \"\"hi\"\"\"\t1.5\t\t\tno\n"
    );
}

#[test]
fn exports_are_idempotent() {
    let table = mixed_table();
    let options = DelimitedOptions::default();
    assert_eq!(
        to_delimited_string(&table, &options),
        to_delimited_string(&table, &options)
    );
    let json_options = JsonOptions { pretty: true };
    assert_eq!(
        to_json_string(&table, &json_options),
        to_json_string(&table, &json_options)
    );
}

#[test]
fn json_keeps_native_shapes() {
    let table = mixed_table();
    let value: serde_json::Value =
        serde_json::from_str(&to_json_string(&table, &JsonOptions::default())).unwrap();
    assert_eq!(
        value,
        json!([
            {"Name": "Widget, large", "Qty": 3, "Due": "2024-02-29", "Tags": ["red", "green"], "Done": true},
            {"Name": "Say \"hi\"", "Qty": 1.5, "Due": null, "Tags": null, "Done": false}
        ])
    );
}

#[test]
fn records_mapping_round_trips() {
    let table = mixed_table();
    let mapping = to_mapping(&table, Orientation::Records);
    let rebuilt = Table::from_records(table.columns().to_vec(), &mapping).unwrap();

    assert_eq!(rebuilt.columns(), table.columns());
    for (left, right) in rebuilt.rows().iter().zip(table.rows()) {
        assert_eq!(left.cells(), right.cells());
    }
}

#[test]
fn sub_millisecond_timestamps_survive_the_mapping() {
    let table = json!({
        "columns": [{"id": "fldAt", "name": "At", "type": "dateTime"}],
        "rows": [
            {"id": "rec1", "cellValuesByColumnId": {"fldAt": "2024-03-01T10:15:00.123456Z"}},
            {"id": "rec2", "cellValuesByColumnId": {"fldAt": "2024-03-01T10:15:00Z"}}
        ]
    });
    let payload = RawPayload::from_table(200, Vec::new(), &table).unwrap();
    let table = assemble(&payload, &CoercionOptions::default());

    let mapping = to_mapping(&table, Orientation::Records);
    assert_eq!(
        mapping,
        json!([{"At": "2024-03-01T10:15:00.123456Z"}, {"At": "2024-03-01T10:15:00Z"}])
    );

    let rebuilt = Table::from_records(table.columns().to_vec(), &mapping).unwrap();
    for (left, right) in rebuilt.rows().iter().zip(table.rows()) {
        assert_eq!(left.cells(), right.cells());
    }
}

#[test]
fn index_mapping_uses_one_based_row_keys() {
    let table = mixed_table();
    let mapping = to_mapping(&table, Orientation::Index);
    let keys: Vec<&String> = mapping.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["row1", "row2"]);
    assert_eq!(mapping["row2"]["Qty"], json!(1.5));

    let rebuilt = Table::from_mapping(table.columns().to_vec(), &mapping).unwrap();
    assert_eq!(rebuilt.len(), 2);
    assert_eq!(rebuilt.value(0, "Tags"), table.value(0, "Tags"));
}

#[test]
fn mapping_with_unknown_key_is_rejected() {
    let table = mixed_table();
    let err = Table::from_records(table.columns().to_vec(), &json!([{"Colour": "blue"}])).unwrap_err();
    assert_eq!(
        err,
        MappingError::UnknownKey {
            row: 0,
            key: "Colour".into(),
        }
    );
    assert!("columns".parse::<Orientation>().is_err());
    assert_eq!("Index".parse::<Orientation>(), Ok(Orientation::Index));
}

#[test]
fn frame_columns_are_typed_by_kind() {
    let table = mixed_table();
    let frame = Frame::from_table(&table);

    assert_eq!(frame.height(), 2);
    assert_eq!(frame.width(), 5);
    assert_eq!(
        frame.dtypes(),
        vec![
            ("Name", "str"),
            ("Qty", "f64"),
            ("Due", "date"),
            ("Tags", "object"),
            ("Done", "bool"),
        ]
    );
    assert_eq!(
        frame.column("Qty").unwrap().data,
        ColumnData::Number(vec![Some(3.0), Some(1.5)])
    );
    assert_eq!(frame.column("Due").unwrap().data.null_count(), 1);
    let ColumnData::Object(tags) = &frame.column("Tags").unwrap().data else {
        panic!("expected object column");
    };
    assert_eq!(tags[0], CellValue::List(vec!["red".into(), "green".into()]));
}

#[test]
fn schema_summary_is_aligned_text() {
    let table = json!({
        "columns": [
            {"id": "fldName", "name": "Name", "type": "text"},
            {"id": "fldTotal", "name": "Total", "type": "formula", "typeOptions": {"resultType": "number"}}
        ],
        "rows": [{"id": "rec1", "cellValuesByColumnId": {"fldName": "A", "fldTotal": 4}}]
    });
    let payload = RawPayload::from_table(200, Vec::new(), &table).unwrap();
    let expected = "\
Total 2 columns:
 #  Column  Airtable Column Type  Resolved Kind     Observed
 -  ------  --------------------  ----------------  --------
 0  Name    text                  text              string
 1  Total   formula               computed(number)  number
kinds: computed(number)(1), text(1)";
    assert_eq!(schema_summary(&payload), expected);
}
