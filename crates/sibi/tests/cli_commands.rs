#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::thread;
use std::time::Duration;

/// Read the client's opening bytes and its version range.
fn read_hello(stream: &mut TcpStream) -> String {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).expect("prefix should arrive");
    assert_eq!(&prefix, b"API\0");

    let mut len = [0u8; 4];
    stream.read_exact(&mut len).expect("length should arrive");
    let mut range = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut range).expect("range should arrive");
    String::from_utf8(range).expect("range should be utf-8")
}

fn framed(fields: &[&str]) -> Vec<u8> {
    let mut payload = Vec::new();
    for field in fields {
        payload.extend_from_slice(field.as_bytes());
        payload.push(0);
    }
    let mut wire = (payload.len() as u32).to_be_bytes().to_vec();
    wire.extend_from_slice(&payload);
    wire
}

fn sibi() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sibi"));
    command.arg("--log-level").arg("error");
    command
}

#[test]
fn probe_reports_negotiated_version() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("probe should connect");
        let range = read_hello(&mut stream);
        stream
            .write_all(&framed(&["176", "20240101 00:00:00 EST"]))
            .expect("reply should send");
        range
    });

    let output = sibi()
        .args(["--format", "json", "probe", "--tws-host", "127.0.0.1"])
        .args(["--tws-port", &port.to_string()])
        .output()
        .expect("probe should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("probe should emit json");
    assert_eq!(payload["server_version"], 176);
    assert_eq!(payload["connection_time"], "20240101 00:00:00 EST");
    assert_eq!(server.join().unwrap(), "v100..176");
}

#[test]
fn probe_silent_gateway_returns_124() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("probe should connect");
        read_hello(&mut stream);
        // hold the socket open without answering
        thread::sleep(Duration::from_secs(2));
    });

    let output = sibi()
        .args(["probe", "--tws-host", "127.0.0.1"])
        .args(["--tws-port", &port.to_string(), "--timeout", "500ms"])
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(124));
    server.join().unwrap();
}

#[test]
fn probe_refused_connection_fails() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        listener.local_addr().unwrap().port()
    };

    let output = sibi()
        .args(["probe", "--tws-host", "127.0.0.1", "--tws-port", &port.to_string()])
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn version_json_reports_package_version() {
    let output = sibi()
        .args(["--format", "json", "version"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version should emit json");
    assert_eq!(payload["name"], "sibi");
    assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(payload["max_client_version"], 176);
}
