#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

struct ServeProcess {
    child: Child,
    handle: String,
    dir: PathBuf,
}

impl Drop for ServeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ipclink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn spawn_serve(tag: &str, extra: &[&str]) -> ServeProcess {
    let dir = unique_temp_dir(tag);
    let mut child = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .arg("serve")
        .arg("--runtime-dir")
        .arg(&dir)
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should spawn");

    let stdout = child.stdout.take().expect("serve stdout should be piped");
    let mut reader = BufReader::new(stdout);
    let mut handle = None;
    for _ in 0..8 {
        let mut line = String::new();
        let read = reader.read_line(&mut line).expect("serve stdout should be readable");
        if read == 0 {
            break;
        }
        if let Some(value) = line.trim_end().strip_prefix("IPCLINK_HANDLE=") {
            handle = Some(value.to_string());
            break;
        }
    }

    let handle = match handle {
        Some(handle) => handle,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            panic!("serve did not print IPCLINK_HANDLE");
        }
    };

    ServeProcess { child, handle, dir }
}

#[test]
fn serve_prints_handle_inside_runtime_dir() {
    let serve = spawn_serve("handle", &["--context", "cli-handle"]);

    assert!(serve.handle.starts_with(serve.dir.to_str().expect("utf-8 dir")));
    assert!(serve.handle.ends_with(".sock"));
    assert!(std::path::Path::new(&serve.handle).exists());
}

#[test]
fn call_echo_through_environment() {
    let serve = spawn_serve("echo", &[]);

    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .args(["--format", "json", "call", "echo", "--json"])
        .arg(r#"{"message":"hello"}"#)
        .env("IPCLINK_HANDLE", &serve.handle)
        .output()
        .expect("call should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("call should emit json");
    assert_eq!(payload, serde_json::json!({ "message": "hello" }));
}

#[test]
fn call_with_explicit_endpoint_and_raw_output() {
    let serve = spawn_serve("raw", &["--echo", "a,b"]);

    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .args(["--format", "raw", "call", "b", "--raw", "--data", "[1,2,3]"])
        .arg("--endpoint")
        .arg(&serve.handle)
        .env_remove("IPCLINK_HANDLE")
        .output()
        .expect("call should run");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"[1,2,3]");
}

#[test]
fn failing_channel_exits_with_failure() {
    let serve = spawn_serve("fail", &["--fail", "boom"]);

    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .args(["call", "boom", "--json", "1", "--endpoint"])
        .arg(&serve.handle)
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("500"));
}

#[test]
fn unknown_channel_exits_with_failure() {
    let serve = spawn_serve("unknown", &[]);

    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .args(["call", "nope", "--json", "null", "--endpoint"])
        .arg(&serve.handle)
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("404"));
}

#[test]
fn call_without_endpoint_returns_64() {
    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .args(["call", "echo", "--json", "null"])
        .env_remove("IPCLINK_HANDLE")
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn call_to_missing_socket_returns_transport_code() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .args(["call", "echo", "--endpoint"])
        .arg(dir.join("absent.sock"))
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn endpoint_command_is_deterministic_for_context() {
    let dir = unique_temp_dir("endpoint");
    let run = || {
        Command::new(env!("CARGO_BIN_EXE_ipclink"))
            .args(["--format", "json", "endpoint", "--context", "abc", "--runtime-dir"])
            .arg(&dir)
            .output()
            .expect("endpoint should run")
    };

    let first = run();
    let second = run();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let payload: serde_json::Value =
        serde_json::from_slice(&first.stdout).expect("endpoint should emit json");
    let expected = dir.join("ipc-ba7816bf8f.sock");
    assert_eq!(
        payload.get("endpoint").and_then(|v| v.as_str()),
        expected.to_str()
    );
    assert_eq!(payload.get("context").and_then(|v| v.as_str()), Some("abc"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("ipclink {}", env!("CARGO_PKG_VERSION")));
}
