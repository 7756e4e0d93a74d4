//! End-to-end conversion tests through the public API.

use std::io::Write;

use cde_datamodel::models::PLACEHOLDER_VERSION;
use cde_datamodel::{
    check_model_file, check_table_file, convert_model, convert_model_file, convert_table,
    convert_table_file, table_to_tree, tree_to_table, validate_data_model, CdeKind,
    ConversionError, ConvertOptions, DataModel, DataModelError, OutputFormat, PipelineError, Row,
    Table,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

const HEADER: &str =
    "csvFile,name,code,type,values,unit,description,canBeNull,comments,conceptPath,methodology";

fn minimal_rows() -> Vec<Row> {
    vec![
        Row {
            name: Some("Dataset Variable".into()),
            code: Some("dataset".into()),
            value_type: Some("nominal".into()),
            values: Some(r#"{"enum1","Enumeration 1"}"#.into()),
            concept_path: Some("Minimal Example/dataset".into()),
            ..Default::default()
        },
        Row {
            name: Some("Group Variable".into()),
            code: Some("group_variable".into()),
            value_type: Some("integer".into()),
            values: Some("0-100".into()),
            concept_path: Some("Minimal Example/Example Group/group_variable".into()),
            ..Default::default()
        },
    ]
}

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn minimal_example_converts_to_tree() {
    let model = table_to_tree(&minimal_rows()).unwrap();

    assert_eq!(model.code(), "Minimal Example");
    assert_eq!(model.root.label.as_deref(), Some("Minimal Example"));
    assert_eq!(model.version.as_deref(), Some(PLACEHOLDER_VERSION));
    assert_eq!(model.root.variables.len(), 1);
    assert_eq!(model.root.variables[0].code, "dataset");

    let group = &model.root.groups[0];
    assert_eq!(group.code, "Example Group");
    assert_eq!(group.variables[0].code, "group_variable");
    assert_eq!(
        group.variables[0].kind,
        CdeKind::Integer {
            min_value: Some(0),
            max_value: Some(100)
        }
    );

    let value = serde_json::to_value(&model).unwrap();
    let variable = &value["groups"][0]["variables"][0];
    assert_eq!(variable["minValue"], 0);
    assert_eq!(variable["maxValue"], 100);
    assert_eq!(variable["sql_type"], "int");
    assert_eq!(value["variables"][0]["isCategorical"], true);
    assert_eq!(value["variables"][0]["enumerations"][0]["label"], "Enumeration 1");
}

#[test]
fn minimal_example_output_is_a_valid_data_model() {
    let model = table_to_tree(&minimal_rows()).unwrap();
    let value = serde_json::to_value(&model).unwrap();
    assert_eq!(validate_data_model(&value), Ok(()));
}

#[test]
fn missing_concept_path_aborts_whole_conversion() {
    let mut rows = minimal_rows();
    rows[1].concept_path = None;

    let err = table_to_tree(&rows).unwrap_err();
    assert_eq!(
        err,
        ConversionError::Variable(DataModelError::MissingConceptPath {
            code: "group_variable".into()
        })
    );
}

#[test]
fn tree_round_trips_through_table() {
    let original = json!({
        "code": "DM",
        "label": "DM",
        "version": "to be defined",
        "variables": [{
            "code": "dataset", "label": "Dataset", "type": "nominal",
            "sql_type": "text", "isCategorical": true,
            "enumerations": [
                {"code": "d1", "label": "Dataset \"one\""},
                {"code": "d2", "label": "Dataset two"}
            ]
        }],
        "groups": [{
            "code": "clinical",
            "label": "clinical",
            "variables": [
                {"code": "age", "label": "Age", "type": "integer", "sql_type": "int",
                 "isCategorical": false, "minValue": 0, "maxValue": 130, "units": "years"},
                {"code": "bmi", "label": "BMI", "type": "real", "sql_type": "real",
                 "isCategorical": false, "minValue": 10.5, "maxValue": 60.25},
                {"code": "notes", "label": "Notes", "type": "text", "sql_type": "text",
                 "isCategorical": false, "description": "Free text"}
            ],
            "groups": [{
                "code": "imaging",
                "label": "imaging",
                "variables": [
                    {"code": "volume", "type": "real", "sql_type": "real", "isCategorical": false}
                ]
            }]
        }]
    });
    assert_eq!(validate_data_model(&original), Ok(()));

    let model: DataModel = serde_json::from_value(original.clone()).unwrap();
    let rebuilt = table_to_tree(&tree_to_table(&model)).unwrap();

    assert_eq!(rebuilt, model);
    assert_eq!(serde_json::to_value(&rebuilt).unwrap(), original);
}

#[test]
fn half_bounded_ranges_round_trip() {
    let original = json!({
        "code": "DM",
        "label": "DM",
        "version": "to be defined",
        "variables": [{
            "code": "dataset", "type": "nominal", "sql_type": "text",
            "isCategorical": true, "enumerations": [{"code": "d1", "label": "D1"}]
        }],
        "groups": [{
            "code": "vitals",
            "label": "vitals",
            "variables": [
                {"code": "age", "type": "integer", "sql_type": "int",
                 "isCategorical": false, "minValue": 0},
                {"code": "temperature", "type": "real", "sql_type": "real",
                 "isCategorical": false, "maxValue": 42.5}
            ]
        }]
    });
    assert_eq!(validate_data_model(&original), Ok(()));

    let table = convert_model(&original, &ConvertOptions::default()).unwrap();
    let rows = table.rows();
    assert_eq!(rows[1].values.as_deref(), Some("0-"));
    assert_eq!(rows[2].values.as_deref(), Some("-42.5"));

    let rebuilt = convert_table(&table, &ConvertOptions::default()).unwrap();
    assert_eq!(serde_json::to_value(&rebuilt).unwrap(), original);
}

#[test]
fn tree_round_trips_through_csv_text() {
    let model = table_to_tree(&minimal_rows()).unwrap();
    let value = serde_json::to_value(&model).unwrap();

    let csv = convert_model(&value, &ConvertOptions::default())
        .unwrap()
        .to_csv()
        .unwrap();
    let file = temp_file(".csv", &csv);

    let rebuilt = convert_table_file(file.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(rebuilt, model);
}

#[test]
fn tree_round_trips_through_xlsx_file() {
    let model = table_to_tree(&minimal_rows()).unwrap();
    let value = serde_json::to_value(&model).unwrap();

    let table = convert_model(&value, &ConvertOptions::default()).unwrap();
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.write_all(&table.encode(OutputFormat::Xlsx).unwrap())
        .unwrap();

    check_table_file(file.path()).unwrap();
    let rebuilt = convert_table_file(file.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(rebuilt, model);
}

#[test]
fn csv_file_with_semicolons_and_units_alias() {
    let content = "\
csvFile;name;code;type;values;units;description;canBeNull;comments;conceptPath;methodology
;Dataset;dataset;nominal;{\"a\",\"A\"},{\"b\",\"B\"};;;;;DM/dataset;
;Height;height;real;;cm;Body height;;;DM/body/height;
";
    let file = temp_file(".csv", content);

    check_table_file(file.path()).unwrap();
    let model = convert_table_file(file.path(), &ConvertOptions::default()).unwrap();
    let height = model.root.find_variable("height").unwrap();
    assert_eq!(height.units.as_deref(), Some("cm"));
    assert_eq!(height.description.as_deref(), Some("Body height"));
}

#[test]
fn invalid_table_is_rejected_before_conversion() {
    let content = format!("{HEADER}\n,Age,age,integer,100-1,,,,,DM/age,\n");
    let table = cde_datamodel::parse_csv(&content, ',').unwrap();

    let err = convert_table(&table, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Invalid(DataModelError::RangeOrder { .. })
    ));
    assert!(err.is_user_error());
}

#[test]
fn unit_and_units_columns_together_are_rejected() {
    let header = HEADER.replace(",unit,", ",unit,units,");
    let file = temp_file(".csv", &format!("{header}\n,Age,age,integer,,years,,,,,DM/age,\n"));

    let err = check_table_file(file.path()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Invalid(DataModelError::DuplicateColumn { ref column }) if column == "unit"
    ));
    assert!(err.is_user_error());
}

#[test]
fn json_file_round_trip_and_validation() {
    let model = table_to_tree(&minimal_rows()).unwrap();
    let file = temp_file(".json", &serde_json::to_string_pretty(&model).unwrap());

    check_model_file(file.path()).unwrap();
    let table: Table = convert_model_file(file.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.rows()[1].concept_path.as_deref(),
        Some("Minimal Example/Example Group/group_variable")
    );
}

#[test]
fn malformed_json_file_is_a_user_error() {
    let file = temp_file(".json", "{ not json");
    let err = check_model_file(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::Json(_)));
    assert!(err.is_user_error());
}

#[test]
fn missing_file_is_not_a_user_error() {
    let err = convert_model_file("/nonexistent/model.json", &ConvertOptions::default())
        .unwrap_err();
    assert!(!err.is_user_error());
}

#[test]
fn duplicate_dataset_codes_in_different_subtrees() {
    let dataset = json!({
        "code": "dataset", "type": "nominal", "sql_type": "text",
        "isCategorical": true, "enumerations": [{"code": "d", "label": "D"}]
    });
    let value: Value = json!({
        "code": "DM", "label": "DM", "version": "1",
        "variables": [dataset.clone()],
        "groups": [{"code": "a", "groups": [{"code": "b", "variables": [dataset]}]}]
    });
    assert!(matches!(
        validate_data_model(&value),
        Err(DataModelError::DuplicateCde { ref path, .. }) if path == "/DM/a/b"
    ));
}
