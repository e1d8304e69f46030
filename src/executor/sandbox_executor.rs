use crate::config::RunnerConfig;
use crate::executor::{
    detect_class_name,
    CodeExecutor,
    ExecutionOutcome,
    ExecutorError,
};
use crate::types::{
    ExecutionRequest,
    Language,
};
use log::{
    debug,
    info,
    warn,
};
use std::{
    io,
    path::Path,
    process::{
        ExitStatus,
        Stdio,
    },
    time::Duration,
};
use nix::{
    errno::Errno,
    sys::signal::{
        killpg,
        Signal,
    },
    unistd::Pid,
};
use tempfile::TempDir;
use tokio::{
    io::{
        AsyncRead,
        AsyncReadExt,
        AsyncWriteExt,
    },
    process::{
        Child,
        Command,
    },
    time::timeout,
};
use uuid::Uuid;

const PYTHON_SCRIPT_NAME: &str = "main.py";

/// Runs submissions as local child processes, one scratch directory per call.
///
/// The directory is removed when the call returns, whatever the outcome.
pub struct SandboxExecutor {
    config: RunnerConfig,
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl SandboxExecutor {
    pub fn new(config: RunnerConfig) -> Self {
        SandboxExecutor { config }
    }

    async fn run_python(
        &self,
        workspace: &Path,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let script = workspace.join(PYTHON_SCRIPT_NAME);
        write_source(&script, &request.source).await?;

        let mut command = Command::new(&self.config.python_bin);
        command.arg(&script).current_dir(workspace);

        match self
            .run_process(command, &request.stdin, self.config.run_timeout)
            .await?
        {
            Some(output) => Ok(completed(output)),
            None => Ok(ExecutionOutcome::TimedOut),
        }
    }

    async fn run_java(
        &self,
        workspace: &Path,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let class_name = detect_class_name(&request.source);
        let file_name = format!("{class_name}.java");
        write_source(&workspace.join(&file_name), &request.source).await?;
        debug!("Detected java class {}", class_name);

        let mut javac = Command::new(&self.config.javac_bin);
        javac.arg(&file_name).current_dir(workspace);

        let compiled = match self
            .run_process(javac, "", self.config.compile_timeout)
            .await?
        {
            Some(output) => output,
            None => return Ok(ExecutionOutcome::TimedOut),
        };

        if !compiled.status.success() {
            info!("Compilation of {} failed with {}", file_name, compiled.status);
            return Ok(ExecutionOutcome::CompileError {
                diagnostics: String::from_utf8_lossy(&compiled.stderr).to_string(),
            });
        }

        let mut java = Command::new(&self.config.java_bin);
        java.arg(format!("-Xmx{}", self.config.java_max_heap))
            .arg("-cp")
            .arg(workspace)
            .arg(&class_name)
            .current_dir(workspace);

        match self
            .run_process(java, &request.stdin, self.config.run_timeout)
            .await?
        {
            Some(output) => Ok(completed(output)),
            None => Ok(ExecutionOutcome::TimedOut),
        }
    }

    /// Spawns `command` in its own process group, feeds it `stdin` and
    /// collects both output streams.
    ///
    /// `limit` bounds the whole call: the wait for the child and the reads
    /// of its pipes, which stay open while any process it started is alive.
    /// Returns `Ok(None)` when `limit` elapses first. The process group is
    /// killed before returning either way.
    async fn run_process(
        &self,
        mut command: Command,
        stdin: &str,
        limit: Duration,
    ) -> Result<Option<ProcessOutput>, ExecutorError> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        debug!("Spawning {:?}", command.as_std());
        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            program: program.clone(),
            source,
        })?;
        let group = child.id();

        if let Some(mut pipe) = child.stdin.take() {
            let input = stdin.as_bytes().to_vec();
            tokio::spawn(async move {
                // Programs that exit without reading their input close the pipe early.
                if let Err(e) = pipe.write_all(&input).await {
                    debug!("Could not write stdin: {}", e);
                }
            });
        }

        let cap = self.config.max_output_bytes;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = timeout(limit, async {
            tokio::try_join!(
                child.wait(),
                read_capped(stdout, cap),
                read_capped(stderr, cap)
            )
        })
        .await;

        kill_group(group, &program);

        match finished {
            Ok(Ok((status, stdout, stderr))) => Ok(Some(ProcessOutput {
                status,
                stdout,
                stderr,
            })),
            Ok(Err(source)) => {
                reap(&mut child, &program).await;
                Err(ExecutorError::Wait { program, source })
            }
            Err(_) => {
                warn!("{} exceeded the {:?} limit, killed its process group", program, limit);
                reap(&mut child, &program).await;
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl CodeExecutor for SandboxExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError> {
        let run_id = Uuid::new_v4();
        let workspace = tempfile::Builder::new()
            .prefix(&format!("run-{run_id}-"))
            .tempdir()
            .map_err(ExecutorError::ScratchDir)?;
        info!(
            "Run {}: executing {:?} submission in {}",
            run_id,
            request.language,
            workspace.path().display()
        );

        let outcome = match request.language {
            Language::Python => self.run_python(workspace.path(), request).await,
            Language::Java => self.run_java(workspace.path(), request).await,
        };

        remove_workspace(workspace);
        outcome
    }
}

fn completed(output: ProcessOutput) -> ExecutionOutcome {
    ExecutionOutcome::Completed {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

async fn write_source(path: &Path, source: &str) -> Result<(), ExecutorError> {
    tokio::fs::write(path, source)
        .await
        .map_err(ExecutorError::WriteSource)
}

/// Reads at most `cap` bytes and discards the rest, so a chatty program
/// never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> io::Result<Vec<u8>> {
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    (&mut reader).take(cap as u64).read_to_end(&mut buf).await?;
    let dropped = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    if dropped > 0 {
        buf.extend_from_slice(format!("\n[output truncated: {dropped} more bytes]\n").as_bytes());
    }
    Ok(buf)
}

fn kill_group(group: Option<u32>, program: &str) {
    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group of {}: {}", program, e),
    }
}

async fn reap(child: &mut Child, program: &str) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to reap {}: {}", program, e);
    }
}

fn remove_workspace(workspace: TempDir) {
    let path = workspace.path().to_path_buf();
    // Dropping the TempDir also removes it, but silently.
    if let Err(e) = workspace.close() {
        warn!("Failed to remove scratch directory {}: {}", path.display(), e);
    }
}
