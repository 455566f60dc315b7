use assert_cmd::Command;
use mockito::{Matcher, Server, ServerGuard};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const DESCRIPTOR: &str = r#"{
  "name": "ergo",
  "aliases": [{ "name": "base", "motors": ["m1", "m2"] }],
  "motors": [
    { "name": "m1", "model": "XL-320", "lower_limit": -90, "upper_limit": 90 },
    { "name": "m2", "model": "XL-320", "lowerLimit": -90, "upperLimit": 90 }
  ]
}"#;

fn poppy(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("poppy").unwrap();
    cmd.current_dir(dir.path()).env("POPPY_ROOT", dir.path());
    cmd
}

/// Command talking to `server` with the robot described by `DESCRIPTOR`.
fn poppy_at(dir: &TempDir, server: &ServerGuard) -> Command {
    let descriptor = dir.path().join("ergo.json");
    std::fs::write(&descriptor, DESCRIPTOR).unwrap();
    let mut cmd = poppy(dir);
    cmd.args(["--host", "127.0.0.1", "--port"])
        .arg(server.socket_address().port().to_string())
        .arg("--descriptor")
        .arg(descriptor);
    cmd
}

// ---------------------------------------------------------------------------
// poppy init / config save
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_rc_file() {
    let dir = TempDir::new().unwrap();
    poppy(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let content = std::fs::read_to_string(dir.path().join(".poppyrc")).unwrap();
    assert!(content.contains("poppy.local"));
    assert!(content.contains("8080"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".poppyrc"), "connection:\n  host: keep.local\n").unwrap();
    poppy(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(dir.path().join(".poppyrc")).unwrap();
    assert!(content.contains("keep.local"));
}

#[test]
fn config_save_persists_flags() {
    let dir = TempDir::new().unwrap();
    poppy(&dir)
        .args(["--host", "poppy2.local", "--port", "9000", "config", "save"])
        .assert()
        .success();

    let content = std::fs::read_to_string(dir.path().join(".poppyrc")).unwrap();
    assert!(content.contains("poppy2.local"));
    assert!(content.contains("9000"));
}

#[test]
fn config_validate_requires_descriptor() {
    let dir = TempDir::new().unwrap();
    poppy(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no descriptor file configured"));
}

// ---------------------------------------------------------------------------
// poppy query
// ---------------------------------------------------------------------------

#[test]
fn query_prints_register_table() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    server
        .mock("GET", "/motors/m1/registers/present_position/value.json")
        .with_body(r#"{"present_position": 12.345}"#)
        .create();
    server
        .mock("GET", "/motors/m2/registers/present_position/value.json")
        .with_body(r#"{"present_position": -4.0}"#)
        .create();

    poppy_at(&dir, &server)
        .args(["query", "-r", "present_position"])
        .assert()
        .success()
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("12.3"))
        .stdout(predicate::str::contains("-4.0"));
}

#[test]
fn query_json_keeps_missing_values() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    server
        .mock("GET", "/motors/m1/registers/led/value.json")
        .with_body(r#"{"led": "red"}"#)
        .create();
    server
        .mock("GET", "/motors/m1/registers/compliant/value.json")
        .with_status(500)
        .create();

    let output = poppy_at(&dir, &server)
        .args(["--json", "query", "-m", "m1", "-r", "led", "compliant"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value, json!({ "m1": { "compliant": null, "led": "red" } }));
}

#[test]
fn query_rejects_unknown_motor() {
    let dir = TempDir::new().unwrap();
    let server = Server::new();
    poppy_at(&dir, &server)
        .args(["query", "-m", "m9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown motor(s): m9"));
}

// ---------------------------------------------------------------------------
// poppy exec
// ---------------------------------------------------------------------------

#[test]
fn exec_stiff_writes_every_motor() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let mock = server
        .mock(
            "POST",
            Matcher::Regex(r"^/motors/m[12]/registers/compliant/value.json$".into()),
        )
        .match_body(Matcher::Json(json!(false)))
        .expect(2)
        .create();

    poppy_at(&dir, &server)
        .args(["exec", "stiff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 step(s)"));
    mock.assert();
}

#[test]
fn exec_goto_accepts_alias_and_negative_angle() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/motors/goto.json")
        .match_body(Matcher::Json(json!({
            "motors": ["m1", "m2"],
            "positions": [-30.0, -30.0],
            "duration": 0.1,
            "wait": false,
        })))
        .create();

    poppy_at(&dir, &server)
        .args(["exec", "position", "-m", "base", "--value", "-30", "--duration", "0.1"])
        .assert()
        .success();
    mock.assert();
}

#[test]
fn exec_speed_is_range_checked() {
    let dir = TempDir::new().unwrap();
    poppy(&dir)
        .args(["exec", "speed", "-m", "m1", "--value", "2000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2000"));
}

#[test]
fn exec_reports_failed_steps() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    server
        .mock("POST", "/motors/m1/registers/led/value.json")
        .with_status(500)
        .create();
    let m2 = server
        .mock("POST", "/motors/m2/registers/led/value.json")
        .match_body(Matcher::Json(json!("green")))
        .create();

    poppy_at(&dir, &server)
        .args(["exec", "led", "-m", "all", "--value", "green"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[step 0] set_led on m1"))
        .stderr(predicate::str::contains("1 of 2 steps failed"));
    m2.assert();
}

#[test]
fn exec_runs_script_file() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let speed = server
        .mock(
            "POST",
            Matcher::Regex(r"^/motors/m[12]/registers/moving_speed/value.json$".into()),
        )
        .match_body(Matcher::Json(json!(100)))
        .expect(2)
        .create();
    let led = server
        .mock("POST", "/motors/m2/registers/led/value.json")
        .match_body(Matcher::Json(json!("blue")))
        .create();

    let script = dir.path().join("wave.yaml");
    std::fs::write(
        &script,
        "- motors: all\n  actions:\n    - { action: set_speed, value: 100 }\n    - { action: wait, value: 0.05 }\n- motors: [m2]\n  actions:\n    - { action: set_led, value: blue }\n",
    )
    .unwrap();

    poppy_at(&dir, &server)
        .args(["--json", "exec", "script"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"steps\": 4"));
    speed.assert();
    led.assert();
}

#[test]
fn exec_script_rejects_unknown_motor_before_running() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let posts = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create();

    let script = dir.path().join("typo.yaml");
    std::fs::write(
        &script,
        "- motors: all\n  actions:\n    - { action: set_compliant, value: false }\n- motors: [m2, m9]\n  actions:\n    - { action: set_led, value: red }\n",
    )
    .unwrap();

    poppy_at(&dir, &server)
        .args(["exec", "script"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown motor(s): m9"));
    posts.assert();
}

// ---------------------------------------------------------------------------
// poppy config discover
// ---------------------------------------------------------------------------

#[test]
fn config_discover_saves_descriptor() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    server
        .mock("GET", "/motors/aliases/list.json")
        .with_body(r#"{"aliases": ["arm"]}"#)
        .create();
    server
        .mock("GET", "/motors/arm/list.json")
        .with_body(r#"{"arm": ["m1"]}"#)
        .create();
    for (register, value) in [
        ("model", json!("XL-320")),
        ("id", json!(1)),
        ("lower_limit", json!(-150)),
        ("upper_limit", json!(150)),
    ] {
        server
            .mock("GET", format!("/motors/m1/registers/{register}/value.json").as_str())
            .with_body(json!({ register: value }).to_string())
            .create();
    }

    let saved = dir.path().join("discovered.json");
    poppy(&dir)
        .args(["--host", "127.0.0.1", "--port"])
        .arg(server.socket_address().port().to_string())
        .args(["config", "discover", "--save"])
        .arg(&saved)
        .assert()
        .success()
        .stdout(predicate::str::contains("arm"))
        .stdout(predicate::str::contains("[-150.0, 150.0]"));

    let content = std::fs::read_to_string(&saved).unwrap();
    assert!(content.contains("Robot lively discovered from 127.0.0.1"));
}
