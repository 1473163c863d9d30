// Drives the local-file-server binary over its stdin/stdout

use serde_json::{json, Value};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

struct ServerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl ServerProcess {
    fn spawn(base: &TempDir) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_local-file-server"))
            .arg("--path")
            .arg(base.path())
            .arg("--log-level")
            .arg("error")
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let stdin = child.stdin.take().unwrap();
        let stdout = BufReader::new(child.stdout.take().unwrap()).lines();
        Self {
            child,
            stdin,
            stdout,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.stdin.write_all(line.as_bytes()).await.unwrap();
        self.stdin.write_all(b"\n").await.unwrap();
        self.stdin.flush().await.unwrap();
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send_line(&message.to_string()).await;
        self.next_response().await
    }

    async fn next_response(&mut self) -> Value {
        let line = self.stdout.next_line().await.unwrap().expect("server closed stdout");
        serde_json::from_str(&line).unwrap()
    }
}

#[tokio::test]
async fn test_initialize_write_and_read_over_stdio() {
    let base = TempDir::new().unwrap();
    let mut server = ServerProcess::spawn(&base);

    let init = server
        .request(
            1,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "stdio-test", "version": "0"}
            }),
        )
        .await;
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "local-file-server");
    assert!(init["result"]["capabilities"]["resources"].is_object());
    assert!(init["result"]["capabilities"]["prompts"].is_null());

    // No reply expected for the notification; the next line answers id 2
    server
        .send_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;

    let written = server
        .request(
            2,
            "tools/call",
            json!({"name": "write_file", "arguments": {"path": "docs/readme.txt", "content": "hello"}}),
        )
        .await;
    assert_eq!(written["id"], 2);
    assert!(written["result"]["isError"].is_null() || written["result"]["isError"] == false);
    assert_eq!(
        std::fs::read_to_string(base.path().join("docs/readme.txt")).unwrap(),
        "hello"
    );

    let read = server
        .request(3, "resources/read", json!({"uri": "storage://local/docs/readme.txt"}))
        .await;
    assert_eq!(read["result"]["contents"][0]["text"], "hello");
    assert_eq!(read["result"]["contents"][0]["mimeType"], "text/plain");

    drop(server.stdin);
    let status = server.child.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_errors_over_stdio() {
    let base = TempDir::new().unwrap();
    let mut server = ServerProcess::spawn(&base);

    server.send_line("this is not json").await;
    let parse_error = server.next_response().await;
    assert_eq!(parse_error["error"]["code"], -32700);
    assert!(parse_error["id"].is_null());

    let unknown = server.request(1, "sampling/createMessage", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let escape = server
        .request(
            2,
            "tools/call",
            json!({"name": "write_file", "arguments": {"path": "../escape.txt", "content": "x"}}),
        )
        .await;
    assert_eq!(escape["result"]["isError"], true);
    let text = escape["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("outside base directory"));
    assert!(!base.path().parent().unwrap().join("escape.txt").exists());

    let missing = server
        .request(3, "resources/read", json!({"uri": "storage://local/missing.txt"}))
        .await;
    assert_eq!(missing["error"]["code"], -32002);
}

#[tokio::test]
async fn test_unusable_base_path_exits_non_zero() {
    let temp_dir = TempDir::new().unwrap();
    let not_a_dir = temp_dir.path().join("plain.txt");
    std::fs::write(&not_a_dir, "occupied").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_local-file-server"))
        .arg("--path")
        .arg(&not_a_dir)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to initialize local file store"));
}
