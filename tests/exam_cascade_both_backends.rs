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

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

/// Both storage backends implement the same cascade: deleting an exam takes
/// its questions (and their progress rows) with it, and deleting something
/// that is already gone reports not_found.
fn run_cascade_scenario(backend: &str) {
    let workspace = tempfile::tempdir().expect("temp workspace");
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.open",
        json!({ "path": workspace.path().to_string_lossy(), "backend": backend }),
    );

    let mut exam_ids = Vec::new();
    for (i, ident) in ["2023AA", "2022AB"].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("e{}", i),
            "exams.create",
            json!({ "identifier": ident }),
        );
        exam_ids.push(
            created
                .get("exam")
                .and_then(|e| e.get("id"))
                .and_then(|v| v.as_str())
                .expect("exam id")
                .to_string(),
        );
    }

    let mut doomed_question = String::new();
    for (i, exam_id) in [&exam_ids[0], &exam_ids[0], &exam_ids[1]].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("q{}", i),
            "questions.create",
            json!({ "examId": exam_id, "questionNumber": i + 1, "type": "open-answer" }),
        );
        if i == 0 {
            doomed_question = created
                .get("question")
                .and_then(|q| q.get("id"))
                .and_then(|v| v.as_str())
                .expect("question id")
                .to_string();
        }
    }

    // Leave a progress row behind one of the doomed questions.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "signin",
        "session.signIn",
        json!({ "name": "alex" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "prog",
        "progress.upsert",
        json!({ "questionId": doomed_question, "solved": true }),
    );

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "exams.delete",
        json!({ "examId": exam_ids[0] }),
    );
    assert_eq!(
        deleted.get("deletedQuestions").and_then(|v| v.as_u64()),
        Some(2),
        "backend {}: cascade should remove the exam's two questions",
        backend
    );

    let listed = request_ok(&mut stdin, &mut reader, "list", "questions.list", json!({}));
    let remaining = listed.get("questions").and_then(|v| v.as_array()).unwrap();
    assert_eq!(remaining.len(), 1, "backend {}", backend);
    assert_eq!(
        remaining[0].get("examId").and_then(|v| v.as_str()),
        Some(exam_ids[1].as_str())
    );

    let progress = request_ok(&mut stdin, &mut reader, "plist", "progress.list", json!({}));
    assert_eq!(
        progress
            .get("progress")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0),
        "backend {}: cascade should clean up progress rows",
        backend
    );

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "again",
        "exams.delete",
        json!({ "examId": exam_ids[0] }),
    );
    assert_eq!(code, "not_found", "backend {}", backend);
}

#[test]
fn exam_delete_cascades_in_sqlite_backend() {
    run_cascade_scenario("sqlite");
}

#[test]
fn exam_delete_cascades_in_json_backend() {
    run_cascade_scenario("json");
}

#[test]
fn missing_ids_report_not_found_in_both_backends() {
    for backend in ["sqlite", "json"] {
        let workspace = tempfile::tempdir().expect("temp workspace");
        let (_child, mut stdin, mut reader) = spawn_daemon();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "ws",
            "workspace.open",
            json!({ "path": workspace.path().to_string_lossy(), "backend": backend }),
        );

        let code = request_err_code(
            &mut stdin,
            &mut reader,
            "dq",
            "questions.delete",
            json!({ "questionId": "missing" }),
        );
        assert_eq!(code, "not_found", "backend {}", backend);

        let code = request_err_code(
            &mut stdin,
            &mut reader,
            "de",
            "exams.delete",
            json!({ "examId": "missing" }),
        );
        assert_eq!(code, "not_found", "backend {}", backend);
    }
}
