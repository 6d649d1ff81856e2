use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_directory(path: &Path) {
    let source = r#"{
        "users": [
            {"id": 1, "name": "Ada", "email": "ada@x.com", "role": "admin"},
            {"id": 2, "name": "Grace", "email": "grace@x.com", "role": "member"}
        ]
    }"#;
    std::fs::write(path, source).expect("directory file write should succeed");
}

fn run_cli(args: &[&str], cwd: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_gatehouse-cli"))
        .args(args)
        .current_dir(cwd)
        .env_remove("GATEHOUSE_DIRECTORY")
        .env_remove("RUST_LOG")
        .output()
        .expect("cli process should start")
}

fn assert_success(output: &std::process::Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_command_known_email_expected_success() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);

    let output = run_cli(
        &[
            "check",
            "--directory",
            directory.to_str().expect("directory path should be utf8"),
            "--email",
            " ADA@x.com ",
        ],
        temp.path(),
    );

    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert!(stdout.contains("authorized: ada@x.com"));
    assert!(stdout.contains("role: admin"));
}

#[test]
fn check_command_unknown_email_expected_exit_code_two() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);

    let output = Command::new(env!("CARGO_BIN_EXE_gatehouse-cli"))
        .args(["check", "--email", "ghost@x.com"])
        .env("GATEHOUSE_DIRECTORY", &directory)
        .current_dir(temp.path())
        .output()
        .expect("cli process should start");

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert!(stdout.contains("not authorized: ghost@x.com"));
}

#[test]
fn add_user_then_users_json_expected_new_entry() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);
    let directory_arg = directory.to_str().expect("directory path should be utf8");

    let added = run_cli(
        &[
            "add-user",
            "--directory",
            directory_arg,
            "--name",
            "Linus",
            "--email",
            "Linus@X.com",
            "--role",
            "member",
        ],
        temp.path(),
    );
    assert_success(&added);
    assert!(String::from_utf8_lossy(&added.stdout).contains("added: 3 linus@x.com (member)"));

    let duplicate = run_cli(
        &[
            "add-user",
            "--directory",
            directory_arg,
            "--name",
            "Linus Again",
            "--email",
            "linus@x.com",
        ],
        temp.path(),
    );
    assert_eq!(duplicate.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&duplicate.stderr).contains("conflict"));

    let listed = run_cli(&["users", "--directory", directory_arg, "--json"], temp.path());
    assert_success(&listed);
    let stdout = String::from_utf8(listed.stdout).expect("stdout should be utf8");
    let value: Value = serde_json::from_str(&stdout).expect("json output should parse");
    let emails: Vec<&str> = value
        .get("users")
        .and_then(Value::as_array)
        .expect("users array should exist")
        .iter()
        .filter_map(|user| user.get("email").and_then(Value::as_str))
        .collect();
    assert_eq!(emails, vec!["ada@x.com", "grace@x.com", "linus@x.com"]);
}

#[test]
fn simulate_redirect_round_trip_expected_authenticated_after_reload() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);

    let output = run_cli(
        &[
            "simulate",
            "--directory",
            directory.to_str().expect("directory path should be utf8"),
            "--next-sign-in",
            "grace@x.com",
            "--step",
            "login",
            "--step",
            "reload",
            "--step",
            "logout",
            "--json",
        ],
        temp.path(),
    );

    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    let reports: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(reports.len(), 4);

    let phase = |index: usize| {
        reports[index]
            .pointer("/state/phase")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    };
    assert_eq!(phase(0), Some("UNAUTHENTICATED".to_string()));
    assert_eq!(
        reports[2]
            .pointer("/state/user/email")
            .and_then(Value::as_str),
        Some("grace@x.com")
    );
    assert_eq!(phase(2), Some("AUTHENTICATED".to_string()));
    assert_eq!(phase(3), Some("UNAUTHENTICATED".to_string()));
}

#[test]
fn simulate_unlisted_identity_expected_denial_and_events() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);

    let output = run_cli(
        &[
            "simulate",
            "--directory",
            directory.to_str().expect("directory path should be utf8"),
            "--signed-in",
            "eve@x.com",
            "--events",
        ],
        temp.path(),
    );

    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert!(stdout.contains("error: account not authorized"));
    assert!(stdout.contains("user: <none>"));
    assert!(stdout.contains("authorization_denied"));
    assert!(stdout.contains("forced_sign_out_completed"));
}

#[test]
fn simulate_failed_redirect_expected_sign_in_failed_message() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);

    let output = run_cli(
        &[
            "simulate",
            "--directory",
            directory.to_str().expect("directory path should be utf8"),
            "--redirect-fails",
        ],
        temp.path(),
    );

    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert!(stdout.contains("error: sign-in failed"));
    assert!(stdout.contains("initializing: false"));
}

#[test]
fn simulate_pending_redirect_expected_authenticated_at_start() {
    let temp = TempDir::new().expect("tempdir should create");
    let directory = temp.path().join("users.json");
    write_directory(&directory);

    let output = run_cli(
        &[
            "simulate",
            "--directory",
            directory.to_str().expect("directory path should be utf8"),
            "--redirect-email",
            "grace@x.com",
            "--json",
        ],
        temp.path(),
    );

    assert_success(&output);
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    let report: Value = serde_json::from_str(stdout.trim()).expect("report should be json");
    assert_eq!(report.get("step").and_then(Value::as_str), Some("start"));
    assert_eq!(
        report.pointer("/state/user/email").and_then(Value::as_str),
        Some("grace@x.com")
    );
    assert_eq!(
        report.pointer("/state/phase").and_then(Value::as_str),
        Some("AUTHENTICATED")
    );
    assert_eq!(report.pointer("/state/error"), Some(&Value::Null));
}
