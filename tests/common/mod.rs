#![allow(dead_code)]

use media_readability::{
    config::{Config, GIB, MIB},
    console::{Console, Level},
    exec::{CommandOutput, CommandRunner, CommandSpec},
};
use std::cell::RefCell;
use std::time::Duration;

/// Which probe step a command belongs to, recovered from its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Presence,
    Size,
    FirstSector,
    Sequential,
    Offset(u64),
    Throughput,
}

type Responder = Box<dyn Fn(Step) -> CommandOutput>;

/// Answers commands from a closure and remembers what was asked.
pub struct ScriptedRunner {
    respond: Responder,
    calls: RefCell<Vec<(Step, CommandSpec, Duration)>>,
}

impl ScriptedRunner {
    pub fn new(respond: impl Fn(Step) -> CommandOutput + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn steps(&self) -> Vec<Step> {
        self.calls.borrow().iter().map(|(s, _, _)| *s).collect()
    }

    pub fn calls(&self) -> Vec<(Step, CommandSpec, Duration)> {
        self.calls.borrow().clone()
    }

    fn classify(&self, cmd: &CommandSpec) -> Step {
        let has = |a: &str| cmd.args.iter().any(|x| x == a);
        if cmd.program == "blockdev" || has("-b") {
            return Step::Size;
        }
        if cmd.program == "lsblk" {
            return Step::Presence;
        }
        let skip = cmd
            .args
            .iter()
            .find_map(|a| a.strip_prefix("skip=").and_then(|v| v.parse::<u64>().ok()));
        let count = cmd
            .args
            .iter()
            .find_map(|a| a.strip_prefix("count=").and_then(|v| v.parse::<u64>().ok()))
            .unwrap_or(0);
        match (count, skip) {
            (1, Some(s)) => Step::Offset(s * 512),
            (1, None) => {
                let seen = self
                    .calls
                    .borrow()
                    .iter()
                    .any(|(s, _, _)| *s == Step::FirstSector);
                if seen { Step::Offset(0) } else { Step::FirstSector }
            }
            (2048, _) => Step::Sequential,
            (20480, _) => Step::Throughput,
            other => panic!("unexpected command {cmd} ({other:?})"),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> CommandOutput {
        let step = self.classify(cmd);
        self.calls.borrow_mut().push((step, cmd.clone(), timeout));
        (self.respond)(step)
    }
}

pub fn ok(stdout: &str, elapsed: Duration) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
        succeeded: true,
        timed_out: false,
        elapsed,
    }
}

pub fn fail(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
        succeeded: false,
        timed_out: false,
        elapsed: Duration::from_millis(3),
    }
}

pub fn timeout(secs: u64) -> CommandOutput {
    CommandOutput {
        exit_code: None,
        stdout: String::new(),
        stderr: format!("Timeout after {secs}s"),
        succeeded: false,
        timed_out: true,
        elapsed: Duration::from_secs(secs),
    }
}

/// A `dd` run that exited 0 after transferring `bytes`, with the transfer
/// summary GNU dd prints on stderr.
pub fn read_ok(bytes: u64, elapsed: Duration) -> CommandOutput {
    let records = bytes / 512;
    CommandOutput {
        stderr: format!(
            "{records}+0 records in\n{records}+0 records out\n{bytes} bytes copied, {:.3} s",
            elapsed.as_secs_f64()
        ),
        ..ok("", elapsed)
    }
}

/// `dd` against empty media: exit 0, nothing transferred.
pub fn short_read() -> CommandOutput {
    read_ok(0, Duration::from_millis(1))
}

/// Healthy device: everything reads, 10 MiB take 2s.
pub fn healthy(step: Step) -> CommandOutput {
    match step {
        Step::Presence => ok("sdb  29.7G disk SD Card", Duration::from_millis(5)),
        Step::Size => ok("31914983424", Duration::from_millis(5)),
        Step::FirstSector | Step::Offset(_) => read_ok(512, Duration::from_millis(20)),
        Step::Sequential => read_ok(MIB, Duration::from_millis(20)),
        Step::Throughput => read_ok(10 * MIB, Duration::from_secs(2)),
    }
}

pub const OFFSETS: [u64; 3] = [0, GIB, 2 * GIB];

pub fn config() -> Config {
    let mut cfg = Config::default();
    cfg.probes.query_device_size = false;
    cfg
}

#[derive(Default)]
pub struct RecordingConsole {
    lines: RefCell<Vec<(Level, String)>>,
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.borrow().clone()
    }

    pub fn has(&self, level: Level, needle: &str) -> bool {
        self.lines
            .borrow()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Console for RecordingConsole {
    fn print(&self, message: &str, level: Level) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }
}
