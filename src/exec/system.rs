use super::{
    types::{CommandOutput, CommandSpec},
    CommandRunner,
};
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Executes commands as real child processes with piped output.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn try_run(&self, cmd: &CommandSpec, timeout: Duration, started: Instant) -> Result<CommandOutput> {
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", cmd.program))?;

        let waited = wait_with_timeout(&mut child, timeout)?;
        let elapsed = started.elapsed();

        let stdout = String::from_utf8_lossy(&waited.stdout).trim().to_string();
        let mut stderr = String::from_utf8_lossy(&waited.stderr).trim().to_string();

        if waited.timed_out {
            warn!("command timed out after {:?}: {cmd}", timeout);
            if stderr.is_empty() {
                stderr = format!("Timeout after {}s", timeout.as_secs());
            } else {
                stderr = format!("Timeout after {}s; {stderr}", timeout.as_secs());
            }
        }

        Ok(CommandOutput {
            exit_code: waited.status.code(),
            stdout,
            stderr,
            succeeded: !waited.timed_out && waited.status.success(),
            timed_out: waited.timed_out,
            elapsed,
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> CommandOutput {
        debug!("exec {cmd} timeout={:?}", timeout);
        let started = Instant::now();
        match self.try_run(cmd, timeout, started) {
            Ok(out) => {
                debug!(
                    "exec done code={:?} ok={} elapsed={:?}",
                    out.exit_code, out.succeeded, out.elapsed
                );
                out
            }
            Err(err) => {
                warn!("exec fault: {cmd}: {:#}", err);
                CommandOutput::fault(format!("{:#}", err), started.elapsed())
            }
        }
    }
}

struct Waited {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    timed_out: bool,
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Waited> {
    // Drain pipes while waiting so a chatty child can't block on a full
    // stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    let (status, timed_out) = loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            break (status, false);
        }

        if start.elapsed() > timeout {
            if let Err(err) = child.kill() {
                warn!("kill after timeout failed: {err}");
            }
            let status = child.wait().with_context(|| "wait after kill")?;
            break (status, true);
        }

        std::thread::sleep(Duration::from_millis(20));
    };

    let stdout = stdout_thread
        .join()
        .map_err(|_| anyhow!("stdout reader thread panicked"))??;
    let stderr = stderr_thread
        .join()
        .map_err(|_| anyhow!("stderr reader thread panicked"))??;

    Ok(Waited {
        status,
        stdout,
        stderr,
        timed_out,
    })
}
