use assert_cmd::Command;
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct CliRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
    pub duration: Duration,
}

impl CliRun {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run the binary with `home` as `$HOME`, so no real user config leaks in.
pub fn run_chromemate<I, S>(home: &Path, args: I) -> CliRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_chromemate_with_env(home, args, std::iter::empty::<(String, String)>())
}

pub fn run_chromemate_with_env<I, S, E, K, V>(home: &Path, args: I, env_vars: E) -> CliRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chromemate"));
    cmd.current_dir(home);
    cmd.args(args);
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_BACKTRACE", "1");
    cmd.env("HOME", home);
    cmd.envs(env_vars);

    let start = Instant::now();
    let output = cmd.output().expect("run chromemate");
    let duration = start.elapsed();

    CliRun {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        status: output.status,
        duration,
    }
}

/// The JSON document on stdout, skipping any leading non-JSON lines.
pub fn extract_json_payload(stdout: &str) -> String {
    let lines: Vec<&str> = stdout.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return lines[idx..].join("\n").trim().to_string();
        }
    }
    stdout.trim().to_string()
}

/// The structured error document the binary prints to stderr when stdout is
/// not a terminal.
pub fn extract_error_payload(stderr: &str) -> serde_json::Value {
    let start = stderr.find("{\n").expect("error JSON on stderr");
    serde_json::from_str(&stderr[start..]).expect("parse error JSON")
}
