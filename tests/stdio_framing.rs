//! Byte-level tests of the stdio framing: one JSON message per `\n`-terminated
//! line, in and out, with payload bytes passed through unchanged.

mod common;

use blender_mcp_bridge::mcp::StdioTransport;
use common::{FakeBlender, Reply};
use serde_json::{json, Value};

/// Feeds `input` to a server and returns everything it wrote.
async fn run_session(fake: &FakeBlender, input: &[u8]) -> Vec<u8> {
    let mut server = fake.server();
    let mut transport = StdioTransport::from_parts(input, Vec::new());
    server.serve(&mut transport).await.unwrap();
    let (_, output) = transport.into_inner();
    output
}

fn output_lines(output: &[u8]) -> Vec<Value> {
    assert_eq!(output.last(), Some(&b'\n'), "output must end with a newline");
    output[..output.len() - 1]
        .split(|&b| b == b'\n')
        .map(|line| {
            assert!(!line.contains(&b'\r'), "carriage return in output line");
            serde_json::from_slice(line).unwrap()
        })
        .collect()
}

fn echo_code(kind: &str, params: &Value) -> Reply {
    match kind {
        "execute_code" => Reply::Success(json!({ "executed": true, "result": params["code"] })),
        _ => Reply::Success(json!({})),
    }
}

#[tokio::test]
async fn code_payload_survives_byte_exact() {
    let fake = FakeBlender::start(echo_code).await;
    let code = "import bpy\r\nprint(\"héllo wörld ✓ 🧊\")\n\tbpy.ops.mesh.primitive_cube_add()\r\n";

    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": "execute_blender_code", "arguments": { "code": code } }
    });
    let mut input = serde_json::to_vec(&request).unwrap();
    input.push(b'\n');

    let output = run_session(&fake, &input).await;
    let lines = output_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines[0]["result"]["content"][0]["text"],
        format!("Code executed: {code}")
    );

    // The add-on received exactly the bytes the client sent.
    assert_eq!(fake.commands()[0]["params"]["code"], code);
}

#[tokio::test]
async fn one_output_line_per_request() {
    let fake = FakeBlender::start(echo_code).await;
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"two","method":"ping"}"#,
        "\r\n",
        "\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"prompts/list"}"#,
    );

    let output = run_session(&fake, input.as_bytes()).await;
    let lines = output_lines(&output);

    let ids: Vec<&Value> = lines.iter().map(|l| &l["id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!("two"), &json!(3), &json!(4)]);
    assert_eq!(lines[2]["result"]["tools"].as_array().unwrap().len(), 21);
}

#[tokio::test]
async fn invalid_utf8_line_is_skipped() {
    let fake = FakeBlender::start(echo_code).await;
    let mut input = Vec::new();
    input.extend_from_slice(b"{\"id\":1,\"method\":\"ping\",\"x\":\"\xff\xfe\"}\n");
    input.extend_from_slice(b"{\"id\":2,\"method\":\"ping\"}\n");

    let output = run_session(&fake, &input).await;
    let lines = output_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], 2);
}

#[tokio::test]
async fn notifications_and_garbage_produce_no_output() {
    let fake = FakeBlender::start(echo_code).await;
    let input = concat!(
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":1}}"#,
        "\n",
        "not json at all\n",
        r#"{"jsonrpc":"2.0","id":7,"result":{}}"#,
        "\n",
    );

    let output = run_session(&fake, input.as_bytes()).await;
    assert!(output.is_empty(), "{}", String::from_utf8_lossy(&output));
    assert!(fake.commands().is_empty());
}

#[tokio::test]
async fn multiline_tool_output_is_escaped_on_one_line() {
    let fake = FakeBlender::start(|_, _| {
        Reply::Success(json!({ "name": "Scene", "objects": ["Cube", "Light", "Camera"] }))
    })
    .await;
    let input = b"{\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"get_scene_info\"}}\n";

    let output = run_session(&fake, input).await;
    let lines = output_lines(&output);
    assert_eq!(lines.len(), 1);

    // The pretty-printed scene JSON spans several lines inside the text field.
    let text = lines[0]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains('\n'));
    let scene: Value = serde_json::from_str(text).unwrap();
    assert_eq!(scene["objects"][2], "Camera");
}
