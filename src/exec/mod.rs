pub mod system;
pub mod types;

use std::time::Duration;

pub use system::SystemRunner;
pub use types::{CommandOutput, CommandSpec, ReadRequest};

/// Runs one external command to completion or timeout.
///
/// Implementations never return an error: spawn failures, I/O errors and
/// timeouts all come back as a failed [`CommandOutput`] with the cause in
/// `stderr`.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> CommandOutput;
}

pub const DRY_RUN_MARKER: &str = "[DRY-RUN]";

/// Reports every command as successful without executing anything. Reads
/// report a full transfer so they count as complete.
pub struct DryRunRunner {
    elapsed: Duration,
}

impl DryRunRunner {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed }
    }
}

impl Default for DryRunRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&self, cmd: &CommandSpec, _timeout: Duration) -> CommandOutput {
        tracing::debug!("dry-run skip: {cmd}");
        CommandOutput {
            exit_code: Some(0),
            stdout: DRY_RUN_MARKER.to_string(),
            stderr: simulated_transfer(cmd).unwrap_or_default(),
            succeeded: true,
            timed_out: false,
            elapsed: self.elapsed,
        }
    }
}

/// dd-style summary for a read command, from its `bs=` and `count=` args.
fn simulated_transfer(cmd: &CommandSpec) -> Option<String> {
    let arg = |key: &str| {
        cmd.args
            .iter()
            .find_map(|a| a.strip_prefix(key).and_then(|v| v.parse::<u64>().ok()))
    };
    let bs = arg("bs=")?;
    let count = arg("count=")?;
    Some(format!(
        "{count}+0 records in\n{count}+0 records out\n{} bytes copied",
        bs * count
    ))
}
