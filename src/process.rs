//! External tool invocation with captured output.
//!
//! Runs a program with arguments, collects stdout and stderr into one
//! buffer (two reader threads feeding a shared, mutex-guarded string) and
//! blocks until the process exits or its timeout expires. Launch failures
//! and timeouts are reported as failed [`ToolOutput`]s, never as panics.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Marker that tools print on errors even when exiting with status 0.
pub const ERROR_MARKER: &str = "ERROR:";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

/// Result of running a [`ToolCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code 0 and no error marker in the output
    pub success: bool,
    /// Exit code, `None` if the process never started, timed out or was killed by a signal
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr
    pub output: String,
    /// The process was killed after exceeding its timeout
    pub timed_out: bool,
}

impl ToolOutput {
    fn launch_failure(message: String) -> Self {
        Self { success: false, exit_code: None, output: message, timed_out: false }
    }
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), current_dir: None, timeout: None }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run the process from this directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion and capture the output.
    pub fn run(&self) -> ToolOutput {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ToolOutput::launch_failure(format!(
                    "{} Failed to launch {}: {}\n",
                    ERROR_MARKER,
                    self.program.display(),
                    e
                ));
            }
        };

        let buffer = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
        }

        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout),
            None => child.wait().map(Some),
        };

        match status {
            Ok(Some(status)) => {
                for reader in readers {
                    let _ = reader.join();
                }
                let output = take_buffer(&buffer);
                let success = status.success() && !output.contains(ERROR_MARKER);
                ToolOutput { success, exit_code: status.code(), output, timed_out: false }
            }
            Ok(None) => {
                // Readers are left detached: a grandchild may still hold the pipes open.
                let mut output = take_buffer(&buffer);
                output.push_str(&format!(
                    "{} {} timed out after {:?} and was killed\n",
                    ERROR_MARKER,
                    self.program.display(),
                    self.timeout.unwrap_or_default()
                ));
                ToolOutput { success: false, exit_code: None, output, timed_out: true }
            }
            Err(e) => {
                let mut output = take_buffer(&buffer);
                output.push_str(&format!(
                    "{} Failed waiting for {}: {}\n",
                    ERROR_MARKER,
                    self.program.display(),
                    e
                ));
                ToolOutput { success: false, exit_code: None, output, timed_out: false }
            }
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

fn spawn_reader<R>(stream: R, buffer: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    let mut shared = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                    shared.push_str(&text);
                    if !text.ends_with('\n') {
                        shared.push('\n');
                    }
                }
            }
        }
    })
}

fn take_buffer(buffer: &Mutex<String>) -> String {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Wait for the child, killing it once `timeout` elapses. `Ok(None)` means it was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("/bin/sh").arg("-c").arg(script)
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let output = sh("echo out; echo err 1>&2").run();
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert!(output.output.contains("out\n"));
        assert!(output.output.contains("err\n"));
    }

    #[test]
    fn test_nonzero_exit_fails() {
        let output = sh("echo broken; exit 3").run();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert!(output.output.contains("broken"));
    }

    #[test]
    fn test_error_marker_fails_with_zero_exit() {
        let output = sh("echo 'ERROR: lit.frag.glsl:3: syntax error'").run();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(0));
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let output = ToolCommand::new("/nonexistent/glslangValidator").run();
        assert!(!output.success);
        assert!(output.output.contains("Failed to launch"));
        assert_eq!(output.exit_code, None);
    }

    #[test]
    fn test_current_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let output = sh("pwd").current_dir(temp.path()).run();
        assert!(output.success);
        let reported = PathBuf::from(output.output.trim());
        assert_eq!(reported.canonicalize().unwrap(), temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_timeout_kills_process() {
        let start = Instant::now();
        let output = sh("exec sleep 5").timeout(Some(Duration::from_millis(100))).run();
        assert!(output.timed_out);
        assert!(!output.success);
        assert!(output.output.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_display_quotes_spaced_args() {
        let command = ToolCommand::new("/tools/reflect").arg("a b.shader").arg("c.ref");
        assert_eq!(command.to_string(), "\"/tools/reflect\" \"a b.shader\" c.ref");
    }
}
