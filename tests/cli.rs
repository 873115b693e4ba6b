mod common;

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::{contains, diff};
use sqlpaste::mapping::MappingConfig;
use sqlpaste::schema::MissingValueSource;

use common::{ORDERS_CSV, TestWorkspace, USERS_SCHEMA};

#[test]
fn detect_reports_each_format_from_stdin() {
    let cases = [
        ("| a | b |\n|---|---|\n| 1 | 2 |\n", "markdown"),
        ("[{\"a\": 1}, {\"a\": 2}]", "json"),
        ("{\"a\": 1}\n{\"a\": 2}\n", "json"),
        ("a;b;c\n1;2;3\n", "csv"),
        ("just some prose", "unknown"),
    ];
    for (input, expected) in cases {
        cargo_bin_cmd!("sqlpaste")
            .arg("detect")
            .write_stdin(input)
            .assert()
            .success()
            .stdout(diff(format!("{expected}\n")));
    }
}

#[test]
fn parse_emits_json_result_with_metadata() {
    let assert = cargo_bin_cmd!("sqlpaste")
        .arg("parse")
        .write_stdin("[{\"a\":1},{\"a\":2,\"b\":\"x\"}]")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("parse output json");
    assert_eq!(value["headers"], serde_json::json!(["a", "b"]));
    assert_eq!(value["rows"][0]["b"], serde_json::Value::Null);
    assert_eq!(value["rows"][1]["b"], "x");
    assert_eq!(value["metadata"]["row_count"], 2);
    assert_eq!(value["metadata"]["source_format"]["format"], "json");
    assert_eq!(value["errors"], serde_json::json!([]));
}

#[test]
fn parse_table_output_lists_diagnostics() {
    cargo_bin_cmd!("sqlpaste")
        .args(["parse", "--output-format", "table"])
        .write_stdin("| a | b |\n|---|---|\n| 1 |\n")
        .assert()
        .success()
        .stdout(contains("column_mismatch").and(contains("∅")));
}

#[test]
fn parse_exports_csv_to_file() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("table.md", "| name | note |\n| --- | --- |\n| Ann | a, b |\n");
    let output = workspace.join("table.csv");
    cargo_bin_cmd!("sqlpaste")
        .args(["parse", "--output-format", "csv", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let contents = fs::read_to_string(&output).expect("read csv output");
    assert_eq!(contents, "name,note\nAnn,\"a, b\"\n");
}

#[test]
fn parse_honours_forced_format() {
    cargo_bin_cmd!("sqlpaste")
        .args(["parse", "--format", "json"])
        .write_stdin("a,b\n1,2\n")
        .assert()
        .success()
        .stdout(contains("format_error"));
}

#[test]
fn parse_uses_explicit_delimiter() {
    let assert = cargo_bin_cmd!("sqlpaste")
        .args(["parse", "--delimiter", "semicolon"])
        .write_stdin("a,b;c\n1,2;3\n")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("parse output json");
    assert_eq!(value["headers"], serde_json::json!(["a,b", "c"]));
    assert_eq!(value["metadata"]["source_format"]["delimiter"], ";");
}

#[test]
fn delimiter_conflicts_with_non_csv_format() {
    cargo_bin_cmd!("sqlpaste")
        .args(["parse", "--delimiter", ";", "--format", "markdown"])
        .write_stdin("a;b\n1;2\n")
        .assert()
        .failure()
        .stderr(contains("--delimiter only applies to csv input"));
}

#[test]
fn parse_reports_empty_json_array_as_empty_table() {
    cargo_bin_cmd!("sqlpaste")
        .arg("parse")
        .write_stdin("[]")
        .assert()
        .success()
        .stdout(contains("empty_table"));
}

#[test]
fn mapping_without_schema_assigns_snake_case_targets() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    cargo_bin_cmd!("sqlpaste")
        .args(["mapping", "-t", "orders", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(
            contains("target_column: full_name")
                .and(contains("target_table: orders"))
                .and(contains("source_type: number")),
        );
}

#[test]
fn mapping_with_schema_matches_columns_and_lists_missing() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let schema = workspace.write("schema.yml", USERS_SCHEMA);
    let mapping_path = workspace.join("mapping.yml");
    cargo_bin_cmd!("sqlpaste")
        .args(["mapping", "-t", "users", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(&schema)
        .arg("-o")
        .arg(&mapping_path)
        .assert()
        .success();

    let config = MappingConfig::load(&mapping_path).expect("load mapping");
    let targets: Vec<&str> = config
        .mappings
        .iter()
        .map(|m| m.target_column.as_str())
        .collect();
    assert_eq!(targets, vec!["id", "full_name", "total"]);
    assert!(
        config
            .mappings
            .iter()
            .all(|m| m.target_table.as_deref() == Some("users"))
    );
    assert_eq!(config.mappings[2].target_type.as_deref(), Some("numeric(10,2)"));
    assert_eq!(config.missing_values.len(), 1);
    assert_eq!(config.missing_values[0].column, "tenant_id");
    assert_eq!(config.missing_values[0].source, MissingValueSource::ForeignKey);
}

#[test]
fn missing_lists_unresolved_columns_and_updates_mapping() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("schema.yml", USERS_SCHEMA);
    let mapping = workspace.write(
        "mapping.yml",
        "mappings:\n  - source_column: ID\n    target_column: id\n    target_table: users\n",
    );
    cargo_bin_cmd!("sqlpaste")
        .args(["missing", "--update", "-m"])
        .arg(&mapping)
        .arg("-s")
        .arg(&schema)
        .assert()
        .success()
        .stdout(contains("tenant_id").and(contains("foreign_key")));

    let config = MappingConfig::load(&mapping).expect("reload mapping");
    assert_eq!(config.missing_values.len(), 1);
    assert!(!config.missing_values[0].is_resolved());
}

#[test]
fn missing_reports_nothing_when_all_required_columns_are_mapped() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("schema.yml", "items:\n  - name: sku\n    data_type: text\n    is_nullable: false\n");
    let mapping = workspace.write(
        "mapping.json",
        r#"{"mappings":[{"source_column":"SKU","target_column":"sku","target_table":"items"}]}"#,
    );
    cargo_bin_cmd!("sqlpaste")
        .args(["missing", "-m"])
        .arg(&mapping)
        .arg("-s")
        .arg(&schema)
        .assert()
        .success()
        .stdout(contains("No required columns are missing."));
}

const ORDERS_MAPPING: &str = "\
mappings:
  - source_column: ID
    target_column: id
    target_table: users
    target_type: integer
  - source_column: Full Name
    target_column: full_name
    target_table: users
  - source_column: Total
    target_column: total
    ignored: true
";

#[test]
fn compile_writes_insert_statements() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let mapping = workspace.write("mapping.yml", ORDERS_MAPPING);
    let output = workspace.join("insert.sql");
    cargo_bin_cmd!("sqlpaste")
        .args(["compile", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&mapping)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let sql = fs::read_to_string(&output).expect("read sql");
    assert_eq!(
        sql,
        "INSERT INTO users (\"id\", \"full_name\") VALUES\n  (1, 'O''Brien'),\n  (2, 'Alice');\n"
    );
}

#[test]
fn compile_with_schema_requires_missing_values() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let schema = workspace.write("schema.yml", USERS_SCHEMA);
    let mapping = workspace.write("mapping.yml", ORDERS_MAPPING);
    cargo_bin_cmd!("sqlpaste")
        .args(["compile", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&mapping)
        .arg("-s")
        .arg(&schema)
        .assert()
        .failure()
        .stderr(contains("tenant_id"));

    let resolved = format!(
        "{ORDERS_MAPPING}missing_values:\n  - table: users\n    column: tenant_id\n    data_type: integer\n    value: \"7\"\n"
    );
    let mapping = workspace.write("resolved.yml", &resolved);
    cargo_bin_cmd!("sqlpaste")
        .args(["compile", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&mapping)
        .arg("-s")
        .arg(&schema)
        .assert()
        .success()
        .stdout(
            contains("INSERT INTO users (\"id\", \"full_name\", \"tenant_id\") VALUES")
                .and(contains("(1, 'O''Brien', 7)")),
        );
}

#[test]
fn compile_strict_identifiers_rejects_suspicious_table_names() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let mapping = workspace.write(
        "mapping.yml",
        "mappings:\n  - source_column: ID\n    target_column: id\n    target_table: \"users; DROP TABLE users\"\n",
    );
    cargo_bin_cmd!("sqlpaste")
        .args(["compile", "--strict-identifiers", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&mapping)
        .assert()
        .failure()
        .stderr(contains("Unsafe SQL identifier"));
}

#[test]
fn compile_refuses_unparseable_input() {
    let workspace = TestWorkspace::new();
    let mapping = workspace.write("mapping.yml", ORDERS_MAPPING);
    cargo_bin_cmd!("sqlpaste")
        .args(["compile", "--format", "markdown", "-m"])
        .arg(&mapping)
        .write_stdin("+-----+-----+\n| a   | b   |\n+-----+-----+\n")
        .assert()
        .failure()
        .stderr(contains("could not be parsed as markdown").and(contains("Grid")));
}
