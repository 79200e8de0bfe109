#![cfg(all(target_os = "linux", feature = "cli"))]

use std::process::Command;

fn u2fhid() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_u2fhid"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn version_prints_package_version() {
    let output = u2fhid().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("u2fhid {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_device_exits_with_transport_error() {
    let missing = format!("/tmp/u2fhid-missing-{}", std::process::id());
    let output = u2fhid()
        .arg("info")
        .arg(&missing)
        .output()
        .expect("info should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open failed"));
}

#[test]
fn oversized_timeout_is_usage_error() {
    let output = u2fhid()
        .args(["--timeout", "18446744073709551615s", "info", "/dev/null"])
        .output()
        .expect("info should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exceeds the maximum"));
}

#[test]
fn invalid_hex_is_usage_error() {
    let output = u2fhid()
        .args(["msg", "/dev/null", "--hex", "0q"])
        .output()
        .expect("msg should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--hex is not valid hex"));
}
