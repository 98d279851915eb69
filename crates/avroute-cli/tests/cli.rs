use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

const EXTRON_SIS: &str = "4f1c2a7e-9d3b-4c61-8e05-7b2d1a90c3e4";
const SONY_RS485: &str = "7e4813c6-a95f-4d2e-b07a-e9c35d6104fb";

fn cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("avroute"));
    cmd.env_remove("AVROUTE_CONFIG")
        .env_remove("RUST_LOG")
        .env("AVROUTE__LOGGING__ANSI", "false");
    cmd
}

#[test]
fn help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("activate").and(contains("power-on")).and(contains("check")));
}

#[test]
fn list_hides_experimental_drivers_by_default() {
    cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains(EXTRON_SIS).and(contains(SONY_RS485).not()));
}

#[test]
fn list_all_as_json() {
    let output = cmd().args(["list", "--all", "--json"]).output().unwrap();
    assert!(output.status.success());

    let drivers: Value = serde_json::from_slice(&output.stdout).unwrap();
    let drivers = drivers.as_array().unwrap();
    assert_eq!(drivers.len(), 7);
    assert!(drivers
        .iter()
        .any(|d| d["id"] == SONY_RS485 && d["kind"] == "monitor"));
}

#[test]
fn config_file_can_show_experimental_drivers() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("avroute.toml");
    std::fs::write(&path, "[general]\nshow_experimental = true\n").unwrap();

    cmd()
        .arg("--config")
        .arg(&path)
        .arg("list")
        .assert()
        .success()
        .stdout(contains(SONY_RS485).and(contains("experimental")));
}

#[test]
fn check_network_location_uses_default_port() {
    cmd()
        .args(["check", "ip:10.0.0.20"])
        .assert()
        .success()
        .stdout(contains("ip:10.0.0.20 (network, tcp port 23)"));
}

#[test]
fn check_honours_configured_port() {
    cmd()
        .env("AVROUTE__TRANSPORT__NETWORK_PORT", "4001")
        .args(["check", "ip:[::1]", "--json"])
        .assert()
        .success()
        .stdout(contains("\"port\": 4001").and(contains("ip:[::1]")));
}

#[test]
fn check_rejects_bad_locations() {
    for location in ["", "ip:", "file:", "ip:host_name"] {
        cmd()
            .args(["check", location])
            .assert()
            .code(2)
            .stderr(contains("invalid location"));
    }
}

#[test]
fn activate_with_unknown_driver_fails() {
    cmd()
        .args([
            "activate",
            "00000000-0000-0000-0000-000000000001",
            "file:",
            "1",
            "1",
        ])
        .assert()
        .code(2)
        .stderr(contains("unknown driver"));
}

#[test]
fn activate_with_missing_serial_port_fails() {
    cmd()
        .args(["activate", EXTRON_SIS, "port:/dev/avroute-missing", "1", "2"])
        .assert()
        .code(2)
        .stderr(contains("invalid location"));
}

#[test]
fn activate_reports_transport_failures() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    cmd()
        .args([
            "activate",
            EXTRON_SIS,
            &format!("ip:127.0.0.1:{}", port),
            "1",
            "2",
        ])
        .assert()
        .code(1)
        .stderr(contains("failed to open"));
}

#[test]
fn retries_only_apply_to_transport_failures() {
    cmd()
        .args(["--retries", "2", "--retry-delay-ms", "1"])
        .args(["activate", EXTRON_SIS, "ip:bad_host", "1", "2"])
        .assert()
        .code(2)
        .stderr(contains("retrying").not());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    cmd()
        .args(["--retries", "1", "--retry-delay-ms", "1"])
        .args(["activate", EXTRON_SIS, &format!("ip:127.0.0.1:{}", port), "1", "2"])
        .assert()
        .code(1)
        .stderr(contains("retrying"));
}

#[test]
fn malformed_driver_id_is_a_usage_error() {
    cmd()
        .args(["power-on", "not-a-uuid", "ip:10.0.0.1"])
        .assert()
        .failure()
        .stderr(contains("not-a-uuid"));
}
