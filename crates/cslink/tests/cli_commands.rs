#![cfg(all(unix, feature = "cli"))]

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use cslink::frame::{encode, ClientId, ClientStatus, Message};
use cslink::peer::connect;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/cslinkcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_listener(path: &Path, timeout: Duration) -> io::Result<()> {
    let start = Instant::now();
    loop {
        match connect(path) {
            Ok(_) => return Ok(()),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn cslink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cslink"));
    cmd.env_remove("CSLINK_ENDPOINT")
        .env_remove("CSLINK_LOG")
        .arg("--log-level")
        .arg("error");
    cmd
}

fn spawn_listener(sock_path: &Path, extra: &[&str]) -> Child {
    let child = cslink()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg("--endpoint")
        .arg(sock_path)
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen command should start");
    wait_for_listener(sock_path, Duration::from_secs(3)).expect("listener should come up");
    child
}

fn send(sock_path: &Path, args: &[&str]) -> Output {
    cslink()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg("--endpoint")
        .arg(sock_path)
        .args(args)
        .output()
        .expect("send should run")
}

#[test]
fn listen_prints_messages_from_every_client() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("shell.sock");
    let child = spawn_listener(&sock_path, &["--count", "2"]);

    let info = send(
        &sock_path,
        &[
            "system-info",
            "--addr",
            "10.0.0.2:8000",
            "--system-version",
            "2.1.0",
        ],
    );
    assert!(info.status.success());
    let notify = send(&sock_path, &["notify", "--code", "3", "--timestamp", "7", "HDMI-1"]);
    assert!(notify.status.success());

    let output = child.wait_with_output().expect("listener should exit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"kind\":\"update-system-info\""));
    assert!(stdout.contains("\"version\":\"2.1.0\""));
    assert!(stdout.contains("\"kind\":\"notify\""));
    assert!(stdout.contains("HDMI-1"));
    assert!(stdout.contains("\"from\":\"conn-"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_wait_prints_the_reply() {
    let dir = unique_temp_dir("wait");
    let sock_path = dir.join("shell.sock");
    let mut child = spawn_listener(&sock_path, &["--status", "3"]);

    let output = send(&sock_path, &["--wait", "--wait-timeout", "3s", "conn-status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"kind\":\"get-conn-status-response\""));
    assert!(stdout.contains("\"status\":3"));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_wait_times_out_with_124() {
    let dir = unique_temp_dir("timeout");
    let sock_path = dir.join("shell.sock");
    let mut child = spawn_listener(&sock_path, &[]);

    // Notifications get no reply.
    let output = send(
        &sock_path,
        &["--wait", "--wait-timeout", "200ms", "notify", "--code", "1"],
    );
    assert_eq!(output.status.code(), Some(124));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_endpoint_returns_3() {
    let dir = unique_temp_dir("missing");
    let output = send(&dir.join("nobody.sock"), &["conn-status"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_prints_client_status() {
    let message = Message::from(ClientStatus {
        client_id: ClientId::try_from("desk-7").expect("id fits"),
        status: 1,
        addr: SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 30), 8000),
        name: "Réunion".into(),
    });
    let hex: String = encode(&message)
        .expect("message should encode")
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    let output = cslink()
        .arg("--format")
        .arg("json")
        .arg("decode")
        .arg(&hex)
        .output()
        .expect("decode should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"kind\":\"client-status\""));
    assert!(stdout.contains("\"client_id\":\"desk-7\""));
    assert!(stdout.contains("Réunion"));
    assert!(stdout.contains("\"addr\":\"192.168.1.30:8000\""));
}

#[test]
fn decode_rejects_bad_magic_with_60() {
    let output = cslink()
        .arg("decode")
        .arg("52544b435800030000000000")
        .output()
        .expect("decode should run");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn decode_reports_truncated_frame() {
    let output = cslink()
        .arg("decode")
        .arg("52544b4353 02 03 00000010 00")
        .output()
        .expect("decode should run");
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("incomplete frame"));
}

#[test]
fn version_prints_package_version() {
    let output = cslink().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("cslink {}", env!("CARGO_PKG_VERSION"))
    );
}
