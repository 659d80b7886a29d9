//! End-to-end tests against copies of the `locator` binary.
//!
//! Each test copies the built binary into a temp dir, optionally switches on
//! its fuse and appends an embedded block, then runs the copy and checks what
//! it reports about itself.

#![cfg(unix)]

use std::io::ErrorKind;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

use locator::core::header::HEADER_REGION_BYTES;
use locator::core::marker::marker;
use locator::exit_codes;
use locator::test_support::{PackagedExecutable, encode_block};
use serde_json::Value;

const SIGABRT: i32 = 6;

fn locator_exe() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_locator"))
}

/// Run a freshly written executable, retrying while the kernel still sees it
/// as open for writing.
fn run(exe: &Path, args: &[&str]) -> Output {
    let mut attempts = 0;
    loop {
        match Command::new(exe).args(args).output() {
            Ok(output) => return output,
            Err(err) if err.kind() == ErrorKind::ExecutableFileBusy && attempts < 20 => {
                attempts += 1;
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => panic!("run {}: {err}", exe.display()),
        }
    }
}

fn status_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("status json")
}

#[test]
fn unpackaged_binary_reports_no_payload() {
    let output = run(locator_exe(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::UNAVAILABLE));
    assert_eq!(status_json(&output)["valid"], false);

    let fuse = run(locator_exe(), &["fuse"]);
    assert_eq!(String::from_utf8_lossy(&fuse.stdout).trim(), "disabled");
}

#[test]
fn fused_binary_without_block_has_no_marker_of_its_own() {
    let packaged = PackagedExecutable::build(locator_exe(), true, b"").expect("package");

    let fuse = run(packaged.path(), &["fuse"]);
    assert_eq!(String::from_utf8_lossy(&fuse.stdout).trim(), "enabled");

    let output = run(packaged.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::UNAVAILABLE));
    assert_eq!(status_json(&output)["valid"], false);
}

#[test]
fn fused_binary_reads_its_own_payload() {
    let script = b"console.log('hello from the payload')\n";
    let packaged = PackagedExecutable::build(locator_exe(), true, &encode_block("-a -b", script))
        .expect("package");
    let image_len = std::fs::metadata(packaged.path()).expect("stat").len();

    let output = run(packaged.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let json = status_json(&output);
    assert_eq!(json["valid"], true);
    assert_eq!(json["options"], serde_json::json!(["-a", "-b"]));
    assert_eq!(json["payload_len"], script.len());
    assert_eq!(json["payload_offset"], image_len - script.len() as u64);

    let payload = run(packaged.path(), &["payload"]);
    assert_eq!(payload.status.code(), Some(exit_codes::OK));
    assert_eq!(payload.stdout, script);
}

#[test]
fn block_without_fuse_is_never_scanned() {
    let packaged = PackagedExecutable::build(locator_exe(), false, &encode_block("-a", b"x"))
        .expect("package");
    let output = run(packaged.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::UNAVAILABLE));
    assert_eq!(status_json(&output)["valid"], false);
}

#[test]
fn truncated_payload_falls_back_without_crashing() {
    let mut block = encode_block("-a", &[7u8; 512]);
    block.truncate(block.len() - 100);
    let packaged = PackagedExecutable::build(locator_exe(), true, &block).expect("package");

    let output = run(packaged.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::UNAVAILABLE));
    assert_eq!(status_json(&output)["valid"], false);
}

#[test]
fn unterminated_header_aborts_the_process() {
    let mut block = marker();
    block.extend(vec![b'x'; HEADER_REGION_BYTES]);
    let packaged = PackagedExecutable::build(locator_exe(), true, &block).expect("package");

    let output = run(packaged.path(), &["status"]);
    assert_eq!(output.status.signal(), Some(SIGABRT));
    assert!(output.stdout.is_empty());
}

#[test]
fn inspect_reads_another_packaged_file() {
    let packaged = PackagedExecutable::build(locator_exe(), false, &encode_block("--inspect", b"42"))
        .expect("package");
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("scan.toml");
    std::fs::write(&config, "window_bytes = 4096\n").expect("write config");

    let path = packaged.path().to_string_lossy().into_owned();
    let output = run(
        locator_exe(),
        &["inspect", &path, "--config", &config.to_string_lossy()],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let json = status_json(&output);
    assert_eq!(json["options"], serde_json::json!(["--inspect"]));
    assert_eq!(json["payload"], "42");
}

#[test]
fn inspect_aborts_on_corrupt_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("corrupt.bin");
    let mut bytes = vec![0x90; 100];
    bytes.extend(marker());
    bytes.extend(vec![b'x'; 10]);
    std::fs::write(&path, bytes).expect("write");

    let output = run(locator_exe(), &["inspect", &path.to_string_lossy()]);
    assert_eq!(output.status.signal(), Some(SIGABRT));
}

#[test]
fn config_written_by_cli_drives_inspect() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("scan.toml");
    std::fs::write(&source, "window_bytes = 128\n").expect("write config");
    let written = temp.path().join("out/locator.toml");

    let output = run(
        locator_exe(),
        &[
            "config",
            &source.to_string_lossy(),
            "--write",
            &written.to_string_lossy(),
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let printed = String::from_utf8_lossy(&output.stdout);
    assert!(printed.contains("window_bytes = 128"), "{printed}");
    let on_disk = std::fs::read_to_string(&written).expect("read written");
    assert!(on_disk.contains("window_bytes = 128"), "{on_disk}");

    let packaged = PackagedExecutable::build(locator_exe(), false, &encode_block("-a", b"ok"))
        .expect("package");
    let path = packaged.path().to_string_lossy().into_owned();
    let inspect = run(
        locator_exe(),
        &["inspect", &path, "--config", &written.to_string_lossy()],
    );
    assert_eq!(inspect.status.code(), Some(exit_codes::OK));
    assert_eq!(status_json(&inspect)["payload"], "ok");
}

#[test]
fn config_rejects_window_smaller_than_marker() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("scan.toml");
    std::fs::write(&source, "window_bytes = 4\n").expect("write config");
    let output = run(locator_exe(), &["config", &source.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
