//! Integration tests for the hypergol CLI.
//!
//! Run with: `cargo test --package hypergol-cli --test cli_integration`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Helper to run the hypergol CLI with given arguments.
fn run_hypergol(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute hypergol command")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Send `signal` (e.g. `-INT`) to a process.
#[cfg(unix)]
fn send_signal(pid: u32, signal: &str) {
    let status = Command::new("kill")
        .args([signal, &pid.to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(status.success());
}

/// Wait for the child, killing it and failing the test after `timeout`.
#[cfg(unix)]
fn wait_with_deadline(mut child: std::process::Child, timeout: std::time::Duration) -> Output {
    let started = std::time::Instant::now();
    while child.try_wait().unwrap().is_none() {
        if started.elapsed() > timeout {
            let _ = child.kill();
            panic!("hypergol did not exit within {timeout:?}");
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    child.wait_with_output().unwrap()
}

/// Live processes whose command line mentions `needle` (Linux only; zero elsewhere).
#[cfg(unix)]
fn processes_mentioning(needle: &str) -> usize {
    let Ok(entries) = fs::read_dir("/proc") else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.chars().all(|c| c.is_ascii_digit()))
        })
        .filter_map(|entry| fs::read(entry.path().join("cmdline")).ok())
        .filter(|cmdline| String::from_utf8_lossy(cmdline).contains(needle))
        .count()
}

/// Files below `dir` whose name ends with `suffix`.
fn files_ending_with(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_ending_with(&path, suffix));
        } else if path.to_string_lossy().ends_with(suffix) {
            found.push(path);
        }
    }
    found
}

/// The `<key>=<n>` count from the sweep summary line.
fn summary_count(stderr: &str, key: &str) -> u64 {
    let line = stderr
        .lines()
        .find(|line| line.starts_with("Sweep finished:"))
        .expect("no sweep summary");
    line.split_whitespace()
        .find_map(|field| field.strip_prefix(&format!("{key}=")))
        .and_then(|n| n.parse().ok())
        .expect("summary field missing")
}

/// All `.log` files below `dir`.
fn logs_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(logs_under(&path));
        } else if path.extension().is_some_and(|ext| ext == "log") {
            found.push(path);
        }
    }
    found
}

// =============================================================================
// General
// =============================================================================

#[test]
fn test_help() {
    let output = run_hypergol(&["--help"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("shell"));
    assert!(stdout.contains("search"));
    assert!(stdout.contains("sweep"));
}

#[test]
fn test_version() {
    let output = run_hypergol(&["--version"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("hypergol"));
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn test_search_report_format() {
    let output = run_hypergol(&[
        "search", "b3/s23", "4", "5", "--layers", "2", "--max-steps", "30", "--seed", "7",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let stdout = stdout_of(&output);
    let lines: Vec<&str> = stdout.lines().collect();

    let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(header["rule"], "b 3 s 2 3");
    assert_eq!(header["p"], 4);
    assert_eq!(header["q"], 5);
    assert_eq!(header["layers"], 2);
    assert_eq!(header["max_steps"], 30);
    assert_eq!(header["seed"], 7);

    assert!(lines[1].starts_with("0: "));
    assert!(lines[1].contains(" DEAD") || lines[1].contains("ALL STATES EQUAL"));
    assert_eq!(*lines.last().unwrap(), "### DONE ###");

    let reasons = [
        "ALL STATES EQUAL",
        "STATIC. NO CHANGE FROM GENERATION",
        "PERIODIC. REVISITED GENERATION",
        "MAX STEPS REACHED",
    ];
    assert!(lines
        .iter()
        .any(|line| reasons.iter().any(|reason| line.contains(reason))));
}

#[test]
fn test_search_is_reproducible() {
    let args = [
        "search", "b 2 3 s 3 4", "7", "3", "-l", "3", "-n", "40", "-s", "12345",
    ];
    let first = run_hypergol(&args);
    let second = run_hypergol(&args);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_search_trace_mode() {
    let output = run_hypergol(&[
        "search", "b3/s23", "4", "5", "-l", "2", "-n", "30", "-s", "3", "--trace",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    let last = stdout.lines().last().unwrap();
    assert!(last.starts_with("TERMINATED: "), "last line: {last}");
    assert!(!stdout.contains("### DONE ###"));
}

#[test]
fn test_search_records_randomization_parameters() {
    let output = run_hypergol(&[
        "search", "b3/s23", "4", "5", "-l", "2", "-n", "5", "-s", "1", "--p-alive", "0.25",
        "--limit", "3",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    let header: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(header["p_alive"], 0.25);
    assert_eq!(header["limit"], 3);
}

#[test]
fn test_search_outfile() {
    let temp = TempDir::new().unwrap();
    let outfile = temp.path().join("nested").join("run.log");

    let output = run_hypergol(&[
        "search",
        "b3/s23",
        "4",
        "5",
        "-l",
        "2",
        "-n",
        "10",
        "-s",
        "9",
        "-o",
        outfile.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(output.stdout.is_empty());

    let contents = fs::read_to_string(&outfile).unwrap();
    assert!(contents.starts_with('{'));
    assert!(contents.trim_end().ends_with("### DONE ###"));
    assert!(!temp.path().join("nested").join("run.log.partial").exists());
}

#[test]
fn test_search_rejects_invalid_rule() {
    let output = run_hypergol(&["search", "3/23", "4", "5", "-l", "2"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("invalid rule"));
}

#[test]
fn test_search_rejects_euclidean_geometry() {
    let output = run_hypergol(&["search", "b3/s23", "4", "4", "-l", "2"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("not hyperbolic"));
}

#[test]
fn test_search_rejects_invalid_probability() {
    let output = run_hypergol(&["search", "b3/s23", "4", "5", "-l", "2", "--p-alive", "1.5"]);
    assert!(!output.status.success());
}

#[test]
fn test_search_exits_quietly_on_closed_pipe() {
    use std::io::{BufRead, BufReader};

    let mut child = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["search", "b 2 s 2 3", "7", "3", "-l", "7", "-n", "20000", "-s", "1"])
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut reader = BufReader::new(child.stdout.take().unwrap());
    let mut header = String::new();
    reader.read_line(&mut header).unwrap();
    assert!(header.starts_with('{'));
    drop(reader);

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.is_empty(), "stderr: {}", stderr_of(&output));
}

// =============================================================================
// Shell
// =============================================================================

#[test]
fn test_shell_script_via_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["shell", "7", "3", "--layers", "2"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"set 0 1 2\nrule b2/s\nrule\nstep 2\nbogus\nset 99\nexit\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("rule: b 2 s"));
    assert!(stdout.contains("unknown command: bogus"));
    assert!(stdout.contains("out of range"));

    // Initial frame, one for `set`, two for `step 2`.
    let frames = stderr_of(&output).matches("[frame ").count();
    assert_eq!(frames, 4);
}

#[test]
fn test_shell_exits_on_end_of_input() {
    let output = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["shell", "5", "4", "-l", "1"])
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[cfg(unix)]
#[test]
fn test_shell_interrupt_redisplays_prompt() {
    use std::time::Duration;

    let mut child = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["shell", "7", "3", "-l", "2"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_secs(1));
    send_signal(child.id(), "-INT");
    std::thread::sleep(Duration::from_millis(300));
    assert!(child.try_wait().unwrap().is_none(), "shell died on interrupt");

    child.stdin.take().unwrap().write_all(b"rule\nexit\n").unwrap();
    let output = wait_with_deadline(child, Duration::from_secs(10));
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("b 3 s 2 3"));
    // Startup, the interrupt, and one after `rule`.
    assert_eq!(stdout.matches("(hypergol) ").count(), 3);
}

#[cfg(unix)]
#[test]
fn test_shell_interrupt_cuts_long_step_short() {
    use std::time::Duration;

    let mut child = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["shell", "7", "3", "-l", "2"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"step 1000000000\nrule\nexit\n")
        .unwrap();

    std::thread::sleep(Duration::from_secs(1));
    send_signal(child.id(), "-INT");

    let output = wait_with_deadline(child, Duration::from_secs(10));
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("interrupted after"), "stdout: {stdout}");
    assert!(stdout.contains("of 1000000000 steps"));
    assert!(stdout.contains("b 3 s 2 3"));
}

// =============================================================================
// Sweep
// =============================================================================

#[test]
fn test_sweep_writes_results() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");

    let output = run_hypergol(&[
        "sweep",
        "--limit",
        "2",
        "--sweep-seed",
        "21",
        "--jobs",
        "2",
        "--layers",
        "2",
        "--max-steps",
        "10",
        "--results-dir",
        results.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stderr_of(&output).contains("completed=2"));

    let logs = logs_under(&results);
    assert_eq!(logs.len(), 2);
    for log in &logs {
        assert_eq!(log.parent().unwrap().file_name().unwrap(), "4_5");
        let name = log.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("b_"), "unexpected name {name}");
        assert!(fs::read_to_string(log).unwrap().contains("### DONE ###"));
    }
}

#[test]
fn test_sweep_skips_finished_jobs() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");
    let args = [
        "sweep",
        "--limit",
        "1",
        "--sweep-seed",
        "4",
        "--jobs",
        "1",
        "--layers",
        "2",
        "--max-steps",
        "10",
        "--results-dir",
        results.to_str().unwrap(),
    ];

    let first = run_hypergol(&args);
    assert!(first.status.success(), "stderr: {}", stderr_of(&first));
    let logs = logs_under(&results);
    assert_eq!(logs.len(), 1);

    fs::write(&logs[0], "sentinel\n").unwrap();

    let second = run_hypergol(&args);
    assert!(second.status.success());
    assert!(stderr_of(&second).contains("skipped=1"));
    assert_eq!(fs::read_to_string(&logs[0]).unwrap(), "sentinel\n");
}

#[cfg(unix)]
#[test]
fn test_sweep_drains_on_interrupt() {
    use std::thread;
    use std::time::Duration;

    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");
    let child = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args([
            "sweep",
            "--sweep-seed",
            "8",
            "--jobs",
            "2",
            "--layers",
            "4",
            "--max-steps",
            "200",
            "--results-dir",
            results.to_str().unwrap(),
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(1500));
    send_signal(child.id(), "-INT");

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("finishing running jobs"));
    assert!(stderr.contains("killed=0"));

    // Every admitted job ran to completion; nothing was left half-written.
    for log in logs_under(&results) {
        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains("### DONE ###"), "incomplete {}", log.display());
    }
    assert!(files_ending_with(&results, ".partial").is_empty());
}

#[cfg(unix)]
#[test]
fn test_sweep_second_interrupt_kills_workers() {
    use std::time::Duration;

    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");
    let child = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args([
            "sweep",
            "--sweep-seed",
            "8",
            "--jobs",
            "2",
            "--layers",
            "8",
            "--max-steps",
            "100000",
            "--results-dir",
            results.to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(1500));
    send_signal(child.id(), "-INT");
    std::thread::sleep(Duration::from_millis(500));
    send_signal(child.id(), "-INT");

    let output = wait_with_deadline(child, Duration::from_secs(30));
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("Killing running jobs"));

    let killed = summary_count(&stderr, "killed");
    assert!(killed > 0, "stderr: {stderr}");

    // No worker outlives the orchestrator.
    assert_eq!(processes_mentioning(results.to_str().unwrap()), 0);

    // Killed workers never publish a finished log.
    for log in logs_under(&results) {
        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains("### DONE ###"), "incomplete {}", log.display());
    }
    let partials = files_ending_with(&results, ".partial").len() as u64;
    assert!(partials <= killed);
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_show_honors_environment() {
    let output = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["config", "show"])
        .env("HYPERGOL_MAX_STEPS", "77")
        .env("HYPERGOL_LAYERS", "3")
        .output()
        .unwrap();
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["max_steps"], 77);
    assert_eq!(config["layers"], 3);
    assert_eq!(config["sweep_layers"], 3);
}

#[test]
fn test_config_rejects_malformed_environment() {
    let output = Command::new(env!("CARGO_BIN_EXE_hypergol"))
        .args(["config", "show"])
        .env("HYPERGOL_JOBS", "many")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("HYPERGOL_JOBS"));
}
