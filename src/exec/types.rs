use std::fmt;
use std::time::Duration;

/// An external command: program plus arguments, never run through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// A raw block read: `count` blocks of `block_size` bytes starting at
/// `offset_bytes`. The data is always discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub offset_bytes: u64,
    pub block_size: u64,
    pub count: u64,
}

impl ReadRequest {
    pub fn bytes(&self) -> u64 {
        self.block_size * self.count
    }

    /// Bytes actually read, taken from the transfer summary `dd` prints on
    /// stderr. `None` when no summary is present.
    pub fn bytes_transferred(&self, out: &CommandOutput) -> Option<u64> {
        parse_dd_transfer(&out.stderr, self.block_size)
    }

    /// True only when the command succeeded and every requested byte was read.
    /// `dd` exits 0 on a short read at end of input, so the exit status alone
    /// is not enough.
    pub fn is_complete(&self, out: &CommandOutput) -> bool {
        out.succeeded && self.bytes_transferred(out) == Some(self.bytes())
    }

    /// Builds the `dd` invocation. Output always goes to /dev/null.
    pub fn to_dd(&self, dd: &str, device: &str) -> CommandSpec {
        let mut cmd = CommandSpec::new(dd).args([
            format!("if={device}"),
            "of=/dev/null".to_string(),
            format!("bs={}", self.block_size),
            format!("count={}", self.count),
        ]);
        if self.offset_bytes > 0 {
            cmd = cmd.arg(format!("skip={}", self.offset_bytes / self.block_size));
        }
        cmd
    }
}

/// Reads the `N bytes ... copied` line, falling back to whole records from
/// `F+P records in`. Partial records are not counted.
pub fn parse_dd_transfer(stderr: &str, block_size: u64) -> Option<u64> {
    let copied = stderr.lines().find_map(|line| {
        if !line.contains("copied") {
            return None;
        }
        let mut words = line.split_whitespace();
        let n = words.next()?.parse::<u64>().ok()?;
        words.next()?.starts_with("byte").then_some(n)
    });
    if copied.is_some() {
        return copied;
    }
    stderr.lines().find_map(|line| {
        let records = line.trim().strip_suffix("records in")?.trim();
        let (full, _partial) = records.split_once('+')?;
        full.parse::<u64>().ok().map(|n| n * block_size)
    })
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub succeeded: bool,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// A command that never produced an exit status (spawn error, wait error).
    pub fn fault(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: message.into(),
            succeeded: false,
            timed_out: false,
            elapsed,
        }
    }

    /// stdout when present, stderr otherwise.
    pub fn diagnostic(&self) -> &str {
        if self.stdout.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}
