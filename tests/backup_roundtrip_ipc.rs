use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examtrackd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examtrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn run_roundtrip(backend: &str) {
    let source = tempfile::tempdir().expect("source workspace");
    let target = tempfile::tempdir().expect("target workspace");
    let bundle_dir = tempfile::tempdir().expect("bundle dir");
    let bundle_path = bundle_dir.path().join("study-backup.zip");

    let (_child, mut stdin, mut reader) = spawn_daemon();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.open",
        json!({ "path": source.path().to_string_lossy(), "backend": backend }),
    );

    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "exam",
        "exams.create",
        json!({ "identifier": "2023AA" }),
    );
    let exam_id = exam
        .get("exam")
        .and_then(|e| e.get("id"))
        .and_then(|v| v.as_str())
        .expect("exam id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "q",
        "questions.create",
        json!({ "examId": exam_id, "questionNumber": 1, "type": "multiple-choice", "tags": ["IPC"] }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "exp",
        "backup.export",
        json!({ "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("examtrack-workspace-v1")
    );
    assert!(bundle_path.is_file());

    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "res",
        "backup.restore",
        json!({
            "inPath": bundle_path.to_string_lossy(),
            "workspacePath": target.path().to_string_lossy(),
        }),
    );
    assert_eq!(
        restored.get("bundleFormatDetected").and_then(|v| v.as_str()),
        Some("examtrack-workspace-v1")
    );

    // Reopen on the restored copy; the data must be intact.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws2",
        "workspace.open",
        json!({ "path": target.path().to_string_lossy(), "backend": backend }),
    );
    let exams = request_ok(&mut stdin, &mut reader, "le", "exams.list", json!({}));
    assert_eq!(
        exams
            .get("exams")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|e| e.get("identifier"))
            .and_then(|v| v.as_str()),
        Some("2023AA")
    );
    let tags = request_ok(&mut stdin, &mut reader, "lt", "tags.list", json!({}));
    assert_eq!(tags.get("tags").cloned(), Some(json!(["IPC"])));
}

#[test]
fn backup_round_trip_sqlite_backend() {
    run_roundtrip("sqlite");
}

#[test]
fn backup_round_trip_json_backend() {
    run_roundtrip("json");
}

#[test]
fn restore_into_the_open_workspace_is_refused() {
    let workspace = tempfile::tempdir().expect("workspace");
    let bundle_dir = tempfile::tempdir().expect("bundle dir");
    let bundle_path = bundle_dir.path().join("study-backup.zip");

    let (_child, mut stdin, mut reader) = spawn_daemon();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.open",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "exam",
        "exams.create",
        json!({ "identifier": "2021BA" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "exp",
        "backup.export",
        json!({ "outPath": bundle_path.to_string_lossy() }),
    );

    let value = request(
        &mut stdin,
        &mut reader,
        "res",
        "backup.restore",
        json!({
            "inPath": bundle_path.to_string_lossy(),
            "workspacePath": workspace.path().to_string_lossy(),
        }),
    );
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("workspace_in_use")
    );
}
