use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("todobot-{nanos}-{file_name}"))
}

fn run_console(store_path: &Path, input: &str) -> Output {
    let exe = env!("CARGO_BIN_EXE_todo_bot");
    let mut child = Command::new(exe)
        .args(["--config-override", "store_backend=json"])
        .arg("--config-override")
        .arg(format!("store_path={}", store_path.display()))
        .args(["console", "--chat-id", "7"])
        .env("TODOBOT_CONFIG_PATH", temp_path("absent-config.json"))
        .env_remove("TODOBOT_STORE_PATH")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start console bot");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("failed to write console input");
    child.wait_with_output().expect("failed to wait for bot")
}

#[test]
fn add_then_list_prints_digest() {
    let store_path = temp_path("console-add.json");
    let output = run_console(
        &store_path,
        "/newitem\nLearn Go\n15-03-2025\n/items\n15-03-2025\n",
    );
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "Please Enter new job.\n\
         Please Enter date in format dd-mm-yyyy.\n\
         Your job was added.\n\
         Please enter date for which you want to see jobs in format dd-mm-yyyy.\n\
         1. Learn Go - TODO\n"
    );
}

#[test]
fn done_flow_shows_and_removes_keyboard() {
    let store_path = temp_path("console-done.json");
    let output = run_console(
        &store_path,
        "/newitem\nLearn Go\n15-03-2025\n/done\n15-03-2025\n1\n/items\n15-03-2025\n",
    );
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(
        "To choose completed job press appropriate key or 0 for cancel.\n\
         0. Cancel\n\
         1. Learn Go\n\
         [keyboard: 0 1]\n\
         Well done!\n\
         [keyboard removed]\n"
    ));
    assert!(stdout.ends_with("1. Learn Go - Done\n"));
}

#[test]
fn busy_state_rejects_commands_until_cancel() {
    let store_path = temp_path("console-busy.json");
    let output = run_console(&store_path, "/newitem\n/items\n/cancel\n/cancel\n");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "Please Enter new job.\n\
         Please complete current operation or cancel it using /cancel.\n\
         Current operation was cancelled.\n\
         I am Idle already.\n"
    );
}

#[test]
fn bad_date_and_selection_are_asked_again() {
    let store_path = temp_path("console-retry.json");
    let output = run_console(
        &store_path,
        "/newitem\nLearn Go\n2025-03-15\n15-03-2025\n/done\n15-03-2025\n5\n0\n",
    );
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Could not parse date. Try again in format dd-mm-yyyy.\nYour job was added.\n"));
    assert!(stdout.contains(
        "Press the button on keyboard or type appropriate number.\n\
         Operation canceled.\n\
         [keyboard removed]\n"
    ));
}

#[test]
fn exit_line_ends_the_session() {
    let store_path = temp_path("console-exit.json");
    let output = run_console(&store_path, "hello\nexit\n/newitem\n");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "Please enter some command. Enter /start to see list of commands.\n"
    );
}
