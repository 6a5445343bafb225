use std::io::{BufRead, BufReader, Write};
use std::process::{ChildStdin, ChildStdout, Stdio};

use serde_json::{json, Value};

#[path = "support/mod.rs"]
mod support;

use support::RsmcpFixture;

#[test]
fn write_tool_creates_a_file_and_status_reports_it() {
    let fx = RsmcpFixture::new();
    let script_id = support::script_id("writeToolProject");

    let mut child = fx
        .process()
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn rsmcp serve");

    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(stdout);

    send_frame(
        &mut stdin,
        json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}),
    );
    let init = expect_response(&mut reader, 1);
    assert_eq!(
        init["result"]["serverInfo"]["name"].as_str(),
        Some("rsmcp")
    );

    send_frame(
        &mut stdin,
        json!({"jsonrpc":"2.0","method":"notifications/initialized","params":{}}),
    );

    send_frame(
        &mut stdin,
        json!({"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}),
    );
    let list_resp = expect_response(&mut reader, 2);
    let tools = list_resp["result"]["tools"].as_array().unwrap();
    for name in ["edit", "aider", "write", "mv", "cp", "rm", "rsync", "status"] {
        assert!(
            tools.iter().any(|t| t["name"].as_str() == Some(name)),
            "tool list should include {name}"
        );
    }

    send_frame(
        &mut stdin,
        json!({
            "jsonrpc":"2.0",
            "id":3,
            "method":"tools/call",
            "params":{
                "name":"write",
                "arguments":{
                    "scriptId": script_id,
                    "path":"Utils",
                    "content":"function f(){return 1}"
                }
            }
        }),
    );
    let write_resp = expect_response(&mut reader, 3);
    let structured = &write_resp["result"]["structuredContent"];
    assert_eq!(structured["success"].as_bool(), Some(true));
    assert!(structured["written"].get("Utils").is_some());
    assert!(structured["git"]["uncommittedCount"].as_u64().unwrap() > 0);

    send_frame(
        &mut stdin,
        json!({
            "jsonrpc":"2.0",
            "id":4,
            "method":"tools/call",
            "params":{
                "name":"status",
                "arguments":{"scriptId": script_id}
            }
        }),
    );
    let status_resp = expect_response(&mut reader, 4);
    assert!(status_resp["result"]["structuredContent"].is_object());

    let written_file = fx.project_repo(&script_id).join("Utils.gs");
    assert!(written_file.exists(), "write tool should leave Utils.gs on disk");
    let contents = std::fs::read_to_string(&written_file).unwrap();
    assert!(contents.contains("function f(){return 1}"));

    drop(stdin);
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn unknown_script_id_is_rejected_with_invalid_params() {
    let fx = RsmcpFixture::new();

    let mut child = fx
        .process()
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn rsmcp serve");

    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(stdout);

    send_frame(
        &mut stdin,
        json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}),
    );
    let _ = expect_response(&mut reader, 1);
    send_frame(
        &mut stdin,
        json!({"jsonrpc":"2.0","method":"notifications/initialized","params":{}}),
    );

    send_frame(
        &mut stdin,
        json!({
            "jsonrpc":"2.0",
            "id":2,
            "method":"tools/call",
            "params":{
                "name":"write",
                "arguments":{
                    "scriptId": "too-short",
                    "path":"Utils",
                    "content":"x"
                }
            }
        }),
    );
    let resp = expect_response(&mut reader, 2);
    assert!(
        resp["result"]["isError"].as_bool().unwrap_or(false)
            || resp.get("error").is_some(),
        "malformed scriptId should fail: {resp}"
    );

    drop(stdin);
    let _ = child.kill();
    let _ = child.wait();
}

fn send_frame(stdin: &mut ChildStdin, payload: Value) {
    serde_json::to_writer(&mut *stdin, &payload).unwrap();
    stdin.write_all(b"\n").unwrap();
    stdin.flush().unwrap();
}

fn read_frame(reader: &mut BufReader<ChildStdout>) -> Value {
    let mut buf = String::new();
    let bytes = reader.read_line(&mut buf).expect("read line");
    assert!(bytes > 0, "rsmcp serve closed pipe unexpectedly");
    serde_json::from_str(buf.trim_end()).expect("valid json line")
}

fn expect_response(reader: &mut BufReader<ChildStdout>, id: i64) -> Value {
    loop {
        let frame = read_frame(reader);
        if let Some(frame_id) = frame.get("id").and_then(|v| v.as_i64()) {
            if frame_id == id {
                return frame;
            }
        }
    }
}
