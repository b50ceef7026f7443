//! Render subprocess management.
//!
//! One subprocess per active job, spawned with piped output. Auxiliary
//! tasks drain stdout and stderr into an unbounded channel; the runner
//! empties that channel on its poll tick and flushes the bytes to the
//! master's log endpoint. Output is the only state shared with the drain
//! tasks, and the channel is the only synchronization around it.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

use netrender_core::error::{ErrorKind, NetError};
use netrender_core::result::NetResult;
use netrender_model::{JobType, RenderJob};

/// Number of `#` placeholders in the render output prefix; the engine
/// expands them to the zero-padded frame number.
const FRAME_PAD: usize = 6;

/// Build the command line for a job.
///
/// `BLENDER` and `VCS` jobs run the configured render binary against the
/// staged root file, with one `-f` argument per frame and the scratch
/// directory as output prefix. `PROCESS` jobs run the frame-supplied
/// command line through the shell.
pub fn build_command(
    job: &RenderJob,
    main_file: Option<&Path>,
    scratch: &Path,
    blender_cmd: &str,
) -> NetResult<Command> {
    match job.job_type {
        JobType::Blender | JobType::Vcs => {
            let main_file = main_file.ok_or_else(|| {
                NetError::validation(format!("Job {} has no staged root file", job.id))
            })?;

            let mut cmd = Command::new(blender_cmd);
            cmd.arg("-b").arg(main_file);
            cmd.arg("-o").arg(scratch.join("#".repeat(FRAME_PAD)));
            for frame in &job.frames {
                cmd.arg("-f").arg(frame.number.to_string());
            }
            Ok(cmd)
        }
        JobType::Process => {
            let command = job
                .frames
                .first()
                .and_then(|f| f.command.as_deref())
                .ok_or_else(|| {
                    NetError::validation(format!("Process job {} carries no command", job.id))
                })?;

            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd.current_dir(scratch);
            Ok(cmd)
        }
    }
}

/// A running render subprocess with its output channel.
#[derive(Debug)]
pub struct RenderProcess {
    child: Child,
    output: mpsc::UnboundedReceiver<Bytes>,
}

impl RenderProcess {
    /// Spawn the subprocess and start draining its output.
    pub fn spawn(mut cmd: Command) -> NetResult<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            NetError::with_source(
                ErrorKind::Process,
                format!("Failed to launch render command: {e}"),
                e,
            )
        })?;

        let (tx, output) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain(stderr, tx));
        }

        debug!("Render subprocess started");
        Ok(Self { child, output })
    }

    /// Empty the buffered output accumulated since the last call.
    pub fn drain_buffered(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        while let Ok(chunk) = self.output.try_recv() {
            buf.extend_from_slice(&chunk);
        }
        buf
    }

    /// Non-blocking exit check.
    pub fn try_wait(&mut self) -> NetResult<Option<ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            NetError::with_source(ErrorKind::Process, "Failed to poll render subprocess", e)
        })
    }

    /// Terminate the subprocess and reap it.
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    /// Wait for the subprocess to exit.
    pub async fn wait(&mut self) -> NetResult<ExitStatus> {
        self.child.wait().await.map_err(|e| {
            NetError::with_source(ErrorKind::Process, "Failed to wait for render subprocess", e)
        })
    }
}

async fn drain(mut reader: impl AsyncReadExt + Unpin, tx: mpsc::UnboundedSender<Bytes>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
        }
    }
}
