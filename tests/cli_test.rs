//! CLI integration tests for the swagger-validator binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("swagger-validator"))
}

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// A small spec whose single operation carries one inline x-ms-example.
fn spec_with_example(location_value: serde_json::Value) -> String {
    json!({
        "swagger": "2.0",
        "info": { "title": "Widgets", "version": "1.0" },
        "paths": {
            "/widgets/{name}": {
                "put": {
                    "operationId": "Widgets_Create",
                    "parameters": [
                        { "name": "name", "in": "path", "required": true, "type": "string" },
                        {
                            "name": "widget", "in": "body", "required": true,
                            "schema": { "$ref": "#/definitions/Widget" }
                        }
                    ],
                    "responses": {
                        "200": { "schema": { "$ref": "#/definitions/Widget" } }
                    },
                    "x-ms-examples": {
                        "Create widget": {
                            "parameters": {
                                "name": "w1",
                                "widget": { "location": location_value }
                            },
                            "responses": {
                                "200": { "body": { "location": "westus" } }
                            }
                        }
                    }
                }
            }
        },
        "definitions": {
            "Widget": {
                "type": "object",
                "properties": { "location": { "type": "string" } },
                "required": ["location"]
            }
        }
    })
    .to_string()
}

mod validate_example_command {
    use super::*;

    #[test]
    fn valid_example_passes() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "swagger.json", &spec_with_example(json!("westus")));

        cmd()
            .args(["validate-example", spec.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""validityStatus":true"#));
    }

    #[test]
    fn invalid_example_exits_one() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "swagger.json", &spec_with_example(json!(42)));

        cmd()
            .args(["validate-example", spec.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""validityStatus":false"#))
            .stdout(predicate::str::contains("RequestValidationError"));
    }

    #[test]
    fn pretty_output_is_indented() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "swagger.json", &spec_with_example(json!("westus")));

        cmd()
            .args(["validate-example", spec.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn operation_filter_is_accepted() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "swagger.json", &spec_with_example(json!("westus")));

        cmd()
            .args([
                "validate-example",
                spec.to_str().unwrap(),
                "--operation-ids",
                "Widgets_Create",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Widgets_Create"));
    }

    #[test]
    fn composite_aggregates_members() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "good.json", &spec_with_example(json!("westus")));
        write_temp_file(&dir, "bad.json", &spec_with_example(json!(42)));
        let manifest = write_temp_file(
            &dir,
            "composite.json",
            &json!({ "documents": ["./good.json", "./bad.json"] }).to_string(),
        );

        cmd()
            .args([
                "validate-example",
                manifest.to_str().unwrap(),
                "--composite",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("good.json"))
            .stdout(predicate::str::contains("bad.json"))
            .stdout(predicate::str::contains(r#""validityStatus":false"#));
    }
}

mod validate_spec_command {
    use super::*;

    #[test]
    fn clean_spec_passes() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "swagger.json", &spec_with_example(json!("westus")));

        cmd()
            .args(["validate-spec", spec.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""validityStatus":true"#));
    }

    #[test]
    fn duplicate_operation_ids_fail() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(
            &dir,
            "swagger.json",
            &json!({
                "swagger": "2.0",
                "paths": {
                    "/a": { "get": { "operationId": "Dup", "responses": { "200": {} } } },
                    "/b": { "get": { "operationId": "Dup", "responses": { "200": {} } } }
                }
            })
            .to_string(),
        );

        cmd()
            .args(["validate-spec", spec.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("SemanticValidationError"))
            .stdout(predicate::str::contains("not unique"));
    }
}

mod resolve_command {
    use super::*;

    #[test]
    fn resolve_flattens_all_of() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(
            &dir,
            "swagger.json",
            &json!({
                "swagger": "2.0",
                "paths": {},
                "definitions": {
                    "Base": { "properties": { "id": { "type": "string" } } },
                    "Child": { "allOf": [{ "$ref": "#/definitions/Base" }] }
                }
            })
            .to_string(),
        );

        cmd()
            .args(["resolve", spec.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("allOf").not())
            .stdout(predicate::str::contains("additionalProperties"));
    }

    #[test]
    fn resolve_with_output_file() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(
            &dir,
            "swagger.json",
            &json!({ "swagger": "2.0", "paths": {}, "definitions": {
                "A": { "type": "object" }
            }})
            .to_string(),
        );
        let output = dir.path().join("resolved.json");

        cmd()
            .args([
                "resolve",
                spec.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            parsed["definitions"]["A"]["additionalProperties"],
            json!(false)
        );
    }

    #[test]
    fn resolve_composite_writes_one_file_per_member() {
        let dir = TempDir::new().unwrap();
        for name in ["a.json", "b.json"] {
            write_temp_file(
                &dir,
                name,
                &json!({ "swagger": "2.0", "paths": {} }).to_string(),
            );
        }
        let manifest = write_temp_file(
            &dir,
            "composite.json",
            &json!({ "documents": ["./a.json", "./b.json"] }).to_string(),
        );
        let out_dir = dir.path().join("resolved");

        cmd()
            .args([
                "resolve",
                manifest.to_str().unwrap(),
                "--composite",
                "--output-dir",
                out_dir.to_str().unwrap(),
            ])
            .assert()
            .success();

        assert!(out_dir.join("a.json").exists());
        assert!(out_dir.join("b.json").exists());
    }

    #[test]
    fn unresolvable_ref_exits_two() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(
            &dir,
            "swagger.json",
            &json!({
                "swagger": "2.0",
                "paths": {},
                "definitions": {
                    "Child": { "allOf": [{ "$ref": "#/definitions/Missing" }] }
                }
            })
            .to_string(),
        );

        cmd()
            .args(["resolve", spec.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("failed to resolve spec"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn missing_spec_is_recorded_in_the_result() {
        cmd()
            .args(["validate-example", "/nonexistent/swagger.json"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("ResolveSpecError"));
    }

    #[test]
    fn resolve_file_not_found_exits_three() {
        cmd()
            .args(["resolve", "/nonexistent/swagger.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("failed to resolve spec"));
    }

    #[test]
    fn invalid_json_exits_two() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "bad.json", "{ not valid json");

        cmd()
            .args(["resolve", spec.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn composite_without_documents_fails() {
        let dir = TempDir::new().unwrap();
        let manifest = write_temp_file(&dir, "composite.json", r#"{"info": {}}"#);

        cmd()
            .args([
                "validate-example",
                manifest.to_str().unwrap(),
                "--composite",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("documents"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Validate OpenAPI 2.0 specs"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("swagger-validator"));
    }

    #[test]
    fn validate_example_help() {
        cmd()
            .args(["validate-example", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--composite"))
            .stdout(predicate::str::contains("--operation-ids"));
    }
}
