//! Command runners - execute `run` scripts in a shell

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tempfile::TempPath;
use tracing::{debug, warn};

/// Errors raised while running a command
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory '{0}' does not exist")]
    WorkingDirectory(PathBuf),

    #[error("Invalid shell '{0}'")]
    InvalidShell(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of process output, without the trailing newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Receives output lines while a command runs
///
/// Object safe, so it can be passed as `&dyn OutputCallback`.
pub trait OutputCallback: Send + Sync {
    fn on_line(&self, line: &OutputLine);
}

/// Callback that drops every line
#[derive(Debug, Clone, Default)]
pub struct NoopCallback;

impl OutputCallback for NoopCallback {
    fn on_line(&self, _line: &OutputLine) {}
}

/// A script to run
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Script body, already rendered
    pub script: String,

    /// Shell name or template; `None` selects the platform default
    pub shell: Option<String>,

    /// Directory to run in
    pub working_dir: PathBuf,

    /// Variables added to the inherited process environment
    pub env: HashMap<String, String>,
}

/// Result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,

    /// Combined stdout and stderr in arrival order
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a script to completion, streaming each line to the callback
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError>;
}

/// Runs scripts as real child processes
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    /// Directory for temporary script files; the system temp dir when unset
    script_dir: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    /// Write the script to `cirun-<random>.<ext>`; the file is deleted when
    /// the returned path is dropped
    fn write_script(&self, extension: &str, script: &str) -> Result<TempPath, RunnerError> {
        let dir = self
            .script_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let mut file = tempfile::Builder::new()
            .prefix("cirun-")
            .suffix(&format!(".{}", extension))
            .tempfile_in(dir)?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        if !request.working_dir.is_dir() {
            return Err(RunnerError::WorkingDirectory(request.working_dir.clone()));
        }

        let template = shell_template(request.shell.as_deref());
        // also removed on drop when a timeout or Ctrl-C abandons this future
        let script = self.write_script(script_extension(&template), &request.script)?;

        let result = spawn_and_stream(&template, &script, request, callback).await;

        let path = script.to_path_buf();
        if let Err(e) = script.close() {
            warn!("Failed to remove script {}: {}", path.display(), e);
        }

        result
    }
}

async fn spawn_and_stream(
    template: &str,
    script_path: &Path,
    request: &CommandRequest,
    callback: Option<&dyn OutputCallback>,
) -> Result<CommandOutput, RunnerError> {
    let (program, args) = build_command(template, script_path)?;
    debug!("Running {} {:?} in {}", program, args, request.working_dir.display());
    debug!("Script:\n{}", request.script);

    let mut child = Command::new(&program)
        .args(&args)
        .current_dir(&request.working_dir)
        .envs(&request.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RunnerError::Io(std::io::Error::other("stdout was not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RunnerError::Io(std::io::Error::other("stderr was not captured")))?;

    let mut collected = Vec::new();
    read_lines(stdout, stderr, |line| {
        if let Some(cb) = callback {
            cb.on_line(&line);
        }
        collected.push(line.text);
    })
    .await?;

    let status = child.wait().await?;
    debug!("{} exited with {:?}", program, status.code());

    Ok(CommandOutput {
        exit_code: status.code(),
        output: collected.join("\n"),
    })
}

/// Read both pipes until EOF, delivering whole lines as they arrive
async fn read_lines<O, E, F>(stdout: O, stderr: E, mut on_line: F) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    F: FnMut(OutputLine),
{
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_done = false;
    let mut err_done = false;

    // read_until keeps partial data in the buffer when cancelled by select!
    while !(out_done && err_done) {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut out_buf), if !out_done => {
                if read? == 0 {
                    out_done = true;
                } else {
                    on_line(take_line(&mut out_buf, OutputStream::Stdout));
                }
            }
            read = stderr.read_until(b'\n', &mut err_buf), if !err_done => {
                if read? == 0 {
                    err_done = true;
                } else {
                    on_line(take_line(&mut err_buf, OutputStream::Stderr));
                }
            }
        }
    }

    Ok(())
}

fn take_line(buf: &mut Vec<u8>, stream: OutputStream) -> OutputLine {
    let text = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    OutputLine { stream, text }
}

/// Prints what would run instead of running it
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner;

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        let mut lines = vec![format!(
            "[dry-run] {} in {}",
            shell_template(request.shell.as_deref()),
            request.working_dir.display()
        )];
        lines.extend(
            request
                .script
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| format!("[dry-run] {}", l)),
        );

        if let Some(cb) = callback {
            for text in &lines {
                cb.on_line(&OutputLine {
                    stream: OutputStream::Stdout,
                    text: text.clone(),
                });
            }
        }

        Ok(CommandOutput {
            exit_code: Some(0),
            output: lines.join("\n"),
        })
    }
}

/// Expand a `shell:` value into a command template containing `{0}`
pub fn shell_template(shell: Option<&str>) -> String {
    match shell.map(str::trim) {
        None | Some("") => {
            if on_path("bash") {
                "bash -e {0}".to_string()
            } else {
                "sh -e {0}".to_string()
            }
        }
        Some("bash") => "bash --noprofile --norc -eo pipefail {0}".to_string(),
        Some("sh") => "sh -e {0}".to_string(),
        Some("python") => "python {0}".to_string(),
        Some("pwsh") => "pwsh -NoProfile -NonInteractive -File {0}".to_string(),
        Some(custom) if custom.contains("{0}") => custom.to_string(),
        Some(custom) => format!("{} {{0}}", custom),
    }
}

/// Split a template into program and arguments, substituting the script path
pub fn build_command(template: &str, script_path: &Path) -> Result<(String, Vec<String>), RunnerError> {
    let script = script_path.display().to_string();
    let mut parts = template
        .split_whitespace()
        .map(|part| part.replace("{0}", &script));

    let program = parts
        .next()
        .ok_or_else(|| RunnerError::InvalidShell(template.to_string()))?;
    Ok((program, parts.collect()))
}

fn script_extension(template: &str) -> &'static str {
    match template.split_whitespace().next() {
        Some("python") | Some("python3") => "py",
        Some("pwsh") => "ps1",
        _ => "sh",
    }
}

fn on_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
