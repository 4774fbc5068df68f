use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

fn plugin_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_protoc-gen-protoapi"))
}

fn unique_run_dir(label: &str) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("protoapi_cli_e2e")
        .join(format!("{label}_{pid}_{nanos}"));
    fs::create_dir_all(&dir).expect("create run dir");
    dir
}

fn greeter_file() -> Value {
    json!({
        "name": "greet/v1/greet.proto",
        "package": "greet.v1",
        "messageType": [
            { "name": "HelloRequest", "field": [
                { "name": "name", "number": 1, "type": "TYPE_STRING", "jsonName": "name" }
            ] },
            { "name": "HelloReply", "field": [
                { "name": "message", "number": 1, "type": "TYPE_STRING", "jsonName": "message" }
            ] }
        ],
        "service": [{ "name": "Greeter", "method": [
            { "name": "SayHello", "inputType": ".greet.v1.HelloRequest", "outputType": ".greet.v1.HelloReply" }
        ] }]
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec_pretty(value).expect("encode")).expect("write fixture");
    path
}

#[test]
fn descriptor_set_mode_writes_documents() {
    let dir = unique_run_dir("descriptor_set");
    let set = write_json(&dir, "set.json", &json!({ "file": [greeter_file()] }));
    let out = dir.join("out");

    let status = Command::new(plugin_bin())
        .arg("--descriptor-set")
        .arg(&set)
        .args(["--file", "greet/v1/greet.proto", "--opt", "format=json"])
        .arg("--out-dir")
        .arg(&out)
        .status()
        .expect("run plugin");
    assert!(status.success());

    let text = fs::read_to_string(out.join("greet/v1/greet.openapi.json")).expect("generated file");
    let doc: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(doc["info"]["title"], json!("Greeter"));
    assert!(doc["paths"]["/greet.v1.Greeter/SayHello"]["post"].is_object());
}

#[test]
fn response_mode_reads_the_request_from_stdin() {
    let request = json!({
        "fileToGenerate": ["greet/v1/greet.proto"],
        "parameter": "short-operation-ids",
        "protoFile": [greeter_file()],
    });

    let mut child = Command::new(plugin_bin())
        .arg("--response")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn plugin");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(request.to_string().as_bytes())
        .expect("write request");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());

    let response: Value = serde_json::from_slice(&output.stdout).expect("response json");
    assert!(response.get("error").is_none());
    assert_eq!(response["file"][0]["name"], json!("greet/v1/greet.openapi.yaml"));
    let content = response["file"][0]["content"].as_str().expect("content");
    assert!(content.contains("operationId: Greeter_SayHello"));
}

#[test]
fn response_mode_reports_run_errors() {
    let dir = unique_run_dir("response_error");
    let request = write_json(
        &dir,
        "request.json",
        &json!({
            "fileToGenerate": ["greet/v1/greet.proto"],
            "parameter": "no-such-option",
            "protoFile": [greeter_file()],
        }),
    );

    let output = Command::new(plugin_bin())
        .arg("--request")
        .arg(&request)
        .arg("--response")
        .output()
        .expect("run plugin");
    assert!(output.status.success());

    let response: Value = serde_json::from_slice(&output.stdout).expect("response json");
    let error = response["error"].as_str().expect("error field");
    assert!(error.contains("no-such-option"), "{error}");
    assert_eq!(response["file"], json!([]));
}

#[test]
fn missing_base_document_fails_without_response_mode() {
    let dir = unique_run_dir("missing_base");
    let set = write_json(&dir, "set.json", &json!({ "file": [greeter_file()] }));

    let output = Command::new(plugin_bin())
        .arg("--descriptor-set")
        .arg(&set)
        .args(["--file", "greet/v1/greet.proto"])
        .arg("--opt")
        .arg(format!("base={}", dir.join("absent.yaml").display()))
        .arg("--out-dir")
        .arg(dir.join("out"))
        .output()
        .expect("run plugin");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("base document"));
}
