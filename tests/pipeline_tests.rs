use std::io::Write;
use std::os::unix::process::CommandExt;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

// A pipeline that never sees end-of-stream hangs, so every run gets a deadline
const DEADLINE: Duration = Duration::from_secs(20);

fn plumb_cmd(args: &[&str]) -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_plumb"));
	cmd.args(args)
		.env_remove("RUST_LOG")
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped());
	cmd
}

fn run_with_input(mut cmd: Command, input: &[u8]) -> Output {
	let mut child = cmd.spawn().expect("failed to spawn plumb");
	let mut stdin = child.stdin.take().unwrap();
	let input = input.to_vec();
	let writer = thread::spawn(move || {
		// The first stage may legitimately exit without reading
		let _ = stdin.write_all(&input);
	});

	let (tx, rx) = mpsc::channel();
	thread::spawn(move || {
		let _ = tx.send(child.wait_with_output());
	});
	let output = rx.recv_timeout(DEADLINE)
		.expect("pipeline did not finish: some stage never saw end-of-stream")
		.expect("failed to collect plumb output");
	writer.join().unwrap();
	output
}

fn plumb(args: &[&str], input: &[u8]) -> Output {
	run_with_input(plumb_cmd(args), input)
}

/// `[1234] message` -> `message`, if the line carries a numeric pid tag
fn strip_pid(line: &str) -> Option<&str> {
	let rest = line.strip_prefix('[')?;
	let (pid, message) = rest.split_once("] ")?;
	pid.parse::<u32>().ok()?;
	Some(message)
}

fn stderr_of(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_cat_cat() {
	let output = plumb(&["cat", "cat"], b"hello\n");
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert_eq!(output.stdout, b"hello\n");
}

#[test]
fn test_sort_uniq() {
	let output = plumb(&["sort", "uniq"], b"b\na\nb\na\n");
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert_eq!(output.stdout, b"a\nb\n");
}

#[test]
fn test_three_stages() {
	let output = plumb(&["cat", "cat", "cat"], b"x");
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert_eq!(output.stdout, b"x");
}

#[test]
fn test_empty_input() {
	let output = plumb(&["cat", "cat"], b"");
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert!(output.stdout.is_empty());
	assert!(output.stderr.is_empty());
}

#[test]
fn test_large_input_keeps_order() {
	// Much larger than a pipe buffer, so every stage blocks on its neighbours at some point
	let input: Vec<u8> = (0..200_000u32)
		.flat_map(|i| format!("{}\n", i).into_bytes())
		.collect();
	let output = plumb(&["cat", "cat", "cat", "cat", "cat"], &input);
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert_eq!(output.stdout.len(), input.len());
	assert!(output.stdout == input);
}

#[test]
fn test_missing_first_command() {
	let output = plumb(&["nonexistent-cmd", "cat"], b"");
	// the last stage read nothing and exited normally
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert!(output.stdout.is_empty());

	let stderr = stderr_of(&output);
	assert_eq!(strip_pid(stderr.trim_end()), Some("plumb: stage 0: nonexistent-cmd: No such file or directory"), "stderr: {}", stderr);
}

#[test]
fn test_missing_middle_command() {
	let output = plumb(&["cat", "nonexistent-cmd", "cat"], b"x\n");
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));
	assert!(output.stdout.is_empty());

	let stderr = stderr_of(&output);
	assert!(stderr.contains("stage 1: nonexistent-cmd"), "stderr: {}", stderr);
	assert!(!stderr.contains("stage 0"), "stderr: {}", stderr);
	assert!(!stderr.contains("stage 2"), "stderr: {}", stderr);
}

#[test]
fn test_missing_last_command() {
	let output = plumb(&["cat", "nonexistent-cmd"], b"x\n");
	// the original process became the last stage, so its failure is what the caller sees
	assert_eq!(output.status.code(), Some(127));
	assert!(output.stdout.is_empty());
	assert!(stderr_of(&output).contains("stage 1: nonexistent-cmd"));
}

#[test]
fn test_last_stage_status_is_observed() {
	let output = plumb(&["true", "false"], b"");
	assert_eq!(output.status.code(), Some(1));

	let output = plumb(&["false", "true"], b"");
	assert!(output.status.success());
}

#[test]
fn test_channel_exhaustion_aborts_before_split() {
	let stages = ["cat"; 10];
	let mut cmd = plumb_cmd(&stages);
	unsafe {
		cmd.pre_exec(|| {
			// Enough to load the binary, but nowhere near the 18 handles nine channels need
			let limit = libc::rlimit { rlim_cur: 16, rlim_max: 16 };
			if libc::setrlimit(libc::RLIMIT_NOFILE, &limit) != 0 {
				return Err(std::io::Error::last_os_error());
			}
			Ok(())
		});
	}
	let output = run_with_input(cmd, b"should not pass through\n");

	assert_eq!(output.status.code(), Some(1));
	// no stage ever ran a command
	assert!(output.stdout.is_empty());
	let stderr = stderr_of(&output);
	let message = strip_pid(stderr.trim_end()).expect("diagnostic should carry the pid");
	assert!(message.starts_with("plumb: couldn't get pipe for channel "), "stderr: {}", stderr);
	assert!(message.ends_with(": Too many open files"), "stderr: {}", stderr);
	assert_eq!(stderr.lines().count(), 1, "stderr: {}", stderr);
}

#[test]
fn test_needs_two_commands() {
	let output = plumb(&["cat"], b"");
	assert_eq!(output.status.code(), Some(2));
	assert!(output.stdout.is_empty());
}

#[test]
fn test_plan_output() {
	let output = plumb(&["--plan", "cat", "sort", "uniq"], b"");
	assert!(output.status.success(), "stderr: {}", stderr_of(&output));

	let wiring: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
	let stages = wiring.as_array().unwrap();
	assert_eq!(stages.len(), 3);
	assert_eq!(stages[0]["command"], "cat");
	assert_eq!(stages[0]["stdin"], "inherit");
	assert_eq!(stages[1]["stdin"]["channel_read"], 0);
	assert_eq!(stages[1]["stdout"]["channel_write"], 1);
	assert_eq!(stages[2]["stdout"], "inherit");
}

#[test]
fn test_verbose_logs_to_stderr() {
	let output = plumb(&["-vv", "cat", "cat"], b"hi\n");
	assert!(output.status.success());
	assert_eq!(output.stdout, b"hi\n");
	let stderr = stderr_of(&output);
	assert!(stderr.contains("running pipeline: cat | cat"), "stderr: {}", stderr);
	assert!(stderr.contains("allocated 1 channels for 2 stages"), "stderr: {}", stderr);
}
