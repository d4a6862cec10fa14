// Command action implementation
// reason: tokio::process for async child management, nix for graceful SIGTERM
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use cadence_core::port::{ActionError, LoopAction};
use cadence_core::CancelToken;

/// How long a cancelled command gets between SIGTERM and SIGKILL (5s)
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Environment variables passed through when no allowlist is configured
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER"];

/// Maximum stderr characters carried in a failure message
const STDERR_TAIL_CHARS: usize = 512;

/// Bytes kept from the end of each output stream
const OUTPUT_TAIL_BYTES: usize = 16 * 1024;

const READ_CHUNK_BYTES: usize = 4096;

/// What to run on every iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
    /// Per-invocation time limit in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_env_allowlist() -> Vec<String> {
    DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect()
}

impl CommandSpec {
    /// Build a spec from `[program, args...]`. Returns None for an empty argv.
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut argv = argv.into_iter();
        let program = argv.next().filter(|p| !p.trim().is_empty())?;
        Some(Self {
            program,
            args: argv.collect(),
            working_dir: default_working_dir(),
            env_allowlist: default_env_allowlist(),
            timeout_ms: None,
        })
    }
}

/// Runs an external command as the loop action
///
/// The child sees only allowlisted environment variables. Cancellation sends
/// SIGTERM (unix), waits `kill_grace`, then kills.
pub struct CommandAction {
    spec: CommandSpec,
    kill_grace: Duration,
}

impl CommandAction {
    /// Create a new command action
    ///
    /// # Example
    /// ```ignore
    /// let spec = CommandSpec::from_argv(vec!["echo".into(), "tick".into()]).unwrap();
    /// let action = CommandAction::new(spec);
    /// ```
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn kill_grace(&self) -> Duration {
        self.kill_grace
    }

    /// Filter environment variables to allowlist only
    fn filter_env(&self, env: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        env.into_iter()
            .filter(|(k, _)| self.spec.env_allowlist.contains(k))
            .collect()
    }

    fn spawn(&self) -> Result<Child, ActionError> {
        let filtered_env = self.filter_env(std::env::vars());

        Command::new(&self.spec.program)
            .args(&self.spec.args)
            .env_clear()
            .envs(&filtered_env)
            .current_dir(&self.spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ActionError::SpawnFailed(format!("{}: {}", self.spec.program, e)))
    }

    /// Wait for exit and for both output streams to close, honoring the
    /// optional per-invocation timeout
    ///
    /// A background process that inherited the pipes keeps them open after
    /// the child exits, so the readers count against the limit too.
    async fn wait_with_limit(
        &self,
        child: &mut Child,
        output: &mut OutputReaders,
    ) -> Result<Finished, ActionError> {
        let limit = self.spec.timeout_ms.map(Duration::from_millis);
        let collect = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), &mut output.stdout, &mut output.stderr);
            Ok::<_, ActionError>(Finished {
                status: status?,
                stdout: stdout.unwrap_or_default(),
                stderr: stderr.unwrap_or_default(),
            })
        };

        let Some(limit) = limit else {
            return collect.await;
        };
        let timed = timeout(limit, collect).await;
        match timed {
            Ok(finished) => finished,
            Err(_) => {
                warn!(program = %self.spec.program, timeout = ?limit, "Command timed out");
                output.abort();
                if matches!(child.try_wait(), Ok(None)) {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill timed out command");
                    }
                }
                Err(ActionError::Timeout(limit))
            }
        }
    }

    /// Stop a cancelled child: SIGTERM first, then SIGKILL if needed
    async fn terminate(&self, child: &mut Child) {
        if !matches!(child.try_wait(), Ok(None)) {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                info!(pid = %pid, "Sending SIGTERM to cancelled command");
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    if let Ok(Ok(status)) = timeout(self.kill_grace, child.wait()).await {
                        info!(pid = %pid, exit_code = ?status.code(), "Command exited after SIGTERM");
                        return;
                    }
                    warn!(pid = %pid, "Command did not exit after SIGTERM, sending SIGKILL");
                }
            }
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill cancelled command");
        }
    }
}

#[async_trait]
impl LoopAction for CommandAction {
    async fn execute(&self, cancel: &CancelToken) -> Result<(), ActionError> {
        let started = Instant::now();
        debug!(
            program = %self.spec.program,
            args = ?self.spec.args,
            working_dir = %self.spec.working_dir.display(),
            "Starting command"
        );

        let mut child = self.spawn()?;
        let mut output = OutputReaders {
            stdout: tokio::spawn(read_tail(child.stdout.take(), OUTPUT_TAIL_BYTES)),
            stderr: tokio::spawn(read_tail(child.stderr.take(), OUTPUT_TAIL_BYTES)),
        };

        let waited = tokio::select! {
            finished = self.wait_with_limit(&mut child, &mut output) => Some(finished),
            _ = cancel.cancelled() => None,
        };
        let Some(finished) = waited else {
            output.abort();
            self.terminate(&mut child).await;
            return Err(ActionError::Cancelled);
        };
        let Finished { status, stdout, stderr } = finished?;

        info!(
            program = %self.spec.program,
            exit_code = ?status.code(),
            duration_ms = %started.elapsed().as_millis(),
            "Command completed"
        );
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim_end(), "Command output");
        }

        if status.success() {
            Ok(())
        } else {
            Err(ActionError::NonZeroExit {
                code: status.code(),
                stderr: stderr_tail(&stderr),
            })
        }
    }
}

/// Exit status plus the tail of each output stream
struct Finished {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Background readers for the child's output; aborted on drop
struct OutputReaders {
    stdout: JoinHandle<String>,
    stderr: JoinHandle<String>,
}

impl OutputReaders {
    fn abort(&self) {
        self.stdout.abort();
        self.stderr.abort();
    }
}

impl Drop for OutputReaders {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Drain `pipe` to EOF, keeping only the last `limit` bytes
async fn read_tail<R: AsyncRead + Unpin>(pipe: Option<R>, limit: usize) -> String {
    let mut tail: VecDeque<u8> = VecDeque::new();
    if let Some(mut pipe) = pipe {
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend(&chunk[..n]);
                    let excess = tail.len().saturating_sub(limit);
                    tail.drain(..excess);
                }
                Err(e) => {
                    debug!(error = %e, "Failed to read command output");
                    break;
                }
            }
        }
    }
    let bytes: Vec<u8> = tail.into_iter().collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Last `STDERR_TAIL_CHARS` characters of trimmed stderr
fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::cancel_channel;

    fn action(argv: &[&str]) -> CommandAction {
        let spec = CommandSpec::from_argv(argv.iter().map(|s| s.to_string()).collect()).unwrap();
        CommandAction::new(spec)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_success() {
        let result = action(&["echo", "hello"]).execute(&CancelToken::never()).await;
        assert_eq!(result, Ok(()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_non_zero_exit_carries_stderr() {
        let result = action(&["sh", "-c", "echo oops >&2; exit 3"])
            .execute(&CancelToken::never())
            .await;

        assert_eq!(
            result,
            Err(ActionError::NonZeroExit {
                code: Some(3),
                stderr: "oops".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_execute_spawn_failure() {
        let result = action(&["definitely-not-a-real-binary-cadence"])
            .execute(&CancelToken::never())
            .await;
        assert!(matches!(result, Err(ActionError::SpawnFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_timeout() {
        let mut spec = CommandSpec::from_argv(vec!["sleep".into(), "10".into()]).unwrap();
        spec.timeout_ms = Some(100);

        let result = CommandAction::new(spec).execute(&CancelToken::never()).await;

        assert_eq!(result, Err(ActionError::Timeout(Duration::from_millis(100))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_covers_inherited_pipes() {
        // The background sleep keeps stdout/stderr open after `sh` exits
        let mut spec = CommandSpec::from_argv(vec![
            "sh".into(),
            "-c".into(),
            "sleep 3 & exit 0".into(),
        ])
        .unwrap();
        spec.timeout_ms = Some(200);

        let started = std::time::Instant::now();
        let result = CommandAction::new(spec).execute(&CancelToken::never()).await;

        assert_eq!(result, Err(ActionError::Timeout(Duration::from_millis(200))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_observed_while_pipes_held_open() {
        let action = action(&["sh", "-c", "sleep 3 & exit 0"]);
        let (source, token) = cancel_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            source.cancel();
        });

        let started = std::time::Instant::now();
        let result = action.execute(&token).await;

        assert_eq!(result, Err(ActionError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_terminates_child() {
        let action = action(&["sleep", "10"]).with_kill_grace(Duration::from_secs(2));
        let (source, token) = cancel_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            source.cancel();
        });

        let started = std::time::Instant::now();
        let result = action.execute(&token).await;

        assert_eq!(result, Err(ActionError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_env_filtering() {
        let mut spec = CommandSpec::from_argv(vec!["true".into()]).unwrap();
        spec.env_allowlist = vec!["ALLOWED_VAR".to_string()];
        let action = CommandAction::new(spec);

        let filtered = action.filter_env(vec![
            ("ALLOWED_VAR".to_string(), "value1".to_string()),
            ("BLOCKED_VAR".to_string(), "value2".to_string()),
        ]);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("ALLOWED_VAR").map(String::as_str), Some("value1"));
    }

    #[test]
    fn test_from_argv() {
        assert_eq!(CommandSpec::from_argv(vec![]), None);
        assert_eq!(CommandSpec::from_argv(vec!["  ".into()]), None);

        let spec = CommandSpec::from_argv(vec!["ls".into(), "-la".into()]).unwrap();
        assert_eq!(spec.program, "ls");
        assert_eq!(spec.args, vec!["-la".to_string()]);
        assert_eq!(spec.env_allowlist, vec!["PATH", "HOME", "USER"]);
    }

    #[test]
    fn test_spec_deserialize_defaults() {
        let spec: CommandSpec = serde_json::from_value(serde_json::json!({
            "program": "echo",
            "timeout_ms": 2500
        }))
        .unwrap();

        assert!(spec.args.is_empty());
        assert_eq!(spec.working_dir, PathBuf::from("."));
        assert_eq!(spec.timeout_ms, Some(2500));
        assert_eq!(spec.env_allowlist.len(), 3);
    }

    #[tokio::test]
    async fn test_read_tail_is_bounded() {
        let data = format!("{}END", "x".repeat(10_000));

        let tail = read_tail(Some(data.as_bytes()), 64).await;
        assert_eq!(tail.len(), 64);
        assert!(tail.ends_with("END"));

        assert_eq!(read_tail(Some("short".as_bytes()), 64).await, "short");
        assert_eq!(read_tail(None::<&[u8]>, 64).await, "");
    }

    #[test]
    fn test_stderr_tail_keeps_the_end() {
        let long = format!("{}END", "x".repeat(1000));
        let tail = stderr_tail(&long);
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("END"));
        assert_eq!(stderr_tail("  short \n"), "short");
    }
}
