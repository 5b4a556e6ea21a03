use crate::{
    config::{Config, MIB},
    console::{Console, Level},
    exec::{CommandOutput, CommandRunner, CommandSpec, ReadRequest},
    report::RunReport,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEVICE_PRESENCE: u8 = 1;
pub const FIRST_SECTOR: u8 = 2;
pub const SEQUENTIAL_READ: u8 = 3;
pub const RANDOM_READ: u8 = 4;
pub const THROUGHPUT: u8 = 5;

pub const PROBE_COUNT: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub probe_id: u8,
    pub name: String,
    pub succeeded: bool,
    /// Only the random-access probe sets this: some, not all, offsets read.
    pub partial: bool,
    pub measurements: Measurements,
    pub diagnostic: String,
}

impl ProbeOutcome {
    pub fn new(probe_id: u8, name: impl Into<String>, succeeded: bool) -> Self {
        Self {
            probe_id,
            name: name.into(),
            succeeded,
            partial: false,
            measurements: Measurements::default(),
            diagnostic: String::new(),
        }
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn with_measurements(mut self, measurements: Measurements) -> Self {
        self.measurements = measurements;
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = diagnostic.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_read: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_mibs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_status: Option<SpeedStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offsets: Vec<OffsetRead>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_reads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<u32>,
}

impl Measurements {
    fn from_command(cmd: &CommandSpec, out: &CommandOutput) -> Self {
        Self {
            command: Some(cmd.to_string()),
            return_code: out.exit_code,
            timed_out: Some(out.timed_out),
            elapsed_seconds: Some(out.elapsed.as_secs_f64()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetRead {
    pub offset_bytes: u64,
    pub sector: u64,
    pub succeeded: bool,
    pub command: String,
    pub elapsed_seconds: f64,
    pub bytes_read: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diagnostic: String,
}

/// One `dd` read and how much of it actually arrived.
struct BlockRead {
    cmd: CommandSpec,
    out: CommandOutput,
    bytes_read: u64,
    complete: bool,
}

impl BlockRead {
    fn measurements(&self) -> Measurements {
        Measurements {
            bytes_read: Some(self.bytes_read),
            ..Measurements::from_command(&self.cmd, &self.out)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeedStatus {
    Ok,
    Degraded,
}

/// MiB/s for `bytes` read in `elapsed`. `None` when no time elapsed.
pub fn throughput_mibs(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(bytes as f64 / MIB as f64 / secs)
}

/// Executes the five probes in order against one device.
pub struct ProbeRunner<'a> {
    cfg: &'a Config,
    runner: &'a dyn CommandRunner,
    console: &'a dyn Console,
}

impl<'a> ProbeRunner<'a> {
    pub fn new(cfg: &'a Config, runner: &'a dyn CommandRunner, console: &'a dyn Console) -> Self {
        Self {
            cfg,
            runner,
            console,
        }
    }

    /// Runs the probe sequence, appending each outcome to `report` as soon as
    /// it completes. Stops after probe 1 or 2 if either fails.
    pub fn run(&self, report: &mut RunReport) {
        let device = report.device().to_string();

        let presence = self.device_presence(&device);
        let present = presence.succeeded;
        report.record(presence);
        if !present {
            warn!("device not detected, skipping remaining probes");
            return;
        }

        if self.cfg.probes.query_device_size {
            report.set_device_size(self.device_size(&device));
        }

        let first = self.first_sector(&device);
        let first_ok = first.succeeded;
        report.record(first);
        if !first_ok {
            warn!("first sector unreadable, skipping remaining probes");
            return;
        }

        report.record(self.sequential_read(&device));
        report.record(self.random_read(&device));
        report.record(self.throughput(&device));
    }

    fn title(&self, id: u8, name: &str) {
        self.console
            .print(&format!("\nTest {id}/{PROBE_COUNT}: {name}"), Level::Title);
    }

    fn result_line(&self, ok: bool, message: &str) {
        self.console
            .print(message, if ok { Level::Ok } else { Level::Error });
    }

    fn read(&self, device: &str, offset_bytes: u64, bytes: u64, timeout: Duration) -> BlockRead {
        let sector = self.cfg.probes.sector_size;
        let req = ReadRequest {
            offset_bytes,
            block_size: sector,
            count: bytes / sector,
        };
        let cmd = req.to_dd(&self.cfg.commands.dd, device);
        let out = self.runner.run(&cmd, timeout);
        let bytes_read = if out.succeeded {
            req.bytes_transferred(&out).unwrap_or(0)
        } else {
            0
        };
        let complete = req.is_complete(&out);
        if out.succeeded && !complete {
            warn!("short read: {bytes_read} of {} bytes: {cmd}", req.bytes());
        }
        BlockRead {
            cmd,
            out,
            bytes_read,
            complete,
        }
    }

    pub fn device_presence(&self, device: &str) -> ProbeOutcome {
        let name = "Device Presence";
        self.title(DEVICE_PRESENCE, name);

        let cmd = CommandSpec::new(&self.cfg.commands.lsblk)
            .args(["-d", "-n", "-o", "NAME,SIZE,TYPE,MODEL", device]);
        let out = self.runner.run(&cmd, self.cfg.timeouts.device_presence());
        let ok = out.succeeded && !out.stdout.is_empty();

        if ok {
            self.result_line(true, &format!("Device detected: {}", out.stdout));
        } else {
            self.result_line(false, &format!("Device NOT detected: {}", out.diagnostic()));
        }
        info!(probe = DEVICE_PRESENCE, ok, "device presence");

        ProbeOutcome::new(DEVICE_PRESENCE, name, ok)
            .with_measurements(Measurements::from_command(&cmd, &out))
            .with_diagnostic(out.diagnostic())
    }

    pub fn first_sector(&self, device: &str) -> ProbeOutcome {
        let name = "First Sector Read";
        self.title(FIRST_SECTOR, name);

        let sector = self.cfg.probes.sector_size;
        let read = self.read(device, 0, sector, self.cfg.timeouts.first_sector());
        let ok = read.complete;

        if ok {
            self.result_line(true, "First sector readable");
        } else {
            self.result_line(
                false,
                &format!("First sector FAILED ({} of {sector} bytes read)", read.bytes_read),
            );
        }
        info!(probe = FIRST_SECTOR, ok, bytes_read = read.bytes_read, "first sector");

        ProbeOutcome::new(FIRST_SECTOR, name, ok)
            .with_measurements(read.measurements())
            .with_diagnostic(read.out.diagnostic())
    }

    pub fn sequential_read(&self, device: &str) -> ProbeOutcome {
        let name = "Sequential Read";
        self.title(SEQUENTIAL_READ, name);

        let bytes = self.cfg.probes.sequential_read_bytes;
        let read = self.read(device, 0, bytes, self.cfg.timeouts.sequential_read());
        let ok = read.complete;

        self.result_line(
            ok,
            &format!(
                "Sequential read {} ({} of {} bytes, {:.2}s)",
                if ok { "OK" } else { "FAILED" },
                read.bytes_read,
                bytes,
                read.out.elapsed.as_secs_f64()
            ),
        );
        info!(
            probe = SEQUENTIAL_READ,
            ok,
            bytes_read = read.bytes_read,
            elapsed = ?read.out.elapsed,
            "sequential read"
        );

        ProbeOutcome::new(SEQUENTIAL_READ, name, ok)
            .with_measurements(read.measurements())
            .with_diagnostic(read.out.diagnostic())
    }

    pub fn random_read(&self, device: &str) -> ProbeOutcome {
        let name = "Random Access Read";
        self.title(RANDOM_READ, name);

        let sector = self.cfg.probes.sector_size;
        let mut offsets = Vec::with_capacity(self.cfg.probes.random_offsets.len());
        let mut elapsed = Duration::ZERO;
        for &offset in &self.cfg.probes.random_offsets {
            let read = self.read(device, offset, sector, self.cfg.timeouts.random_read());
            self.result_line(
                read.complete,
                &format!(
                    "  Offset {offset} {}",
                    if read.complete { "OK" } else { "FAILED" }
                ),
            );
            elapsed += read.out.elapsed;
            offsets.push(OffsetRead {
                offset_bytes: offset,
                sector: offset / sector,
                succeeded: read.complete,
                command: read.cmd.to_string(),
                elapsed_seconds: read.out.elapsed.as_secs_f64(),
                bytes_read: read.bytes_read,
                diagnostic: if read.complete {
                    String::new()
                } else {
                    read.out.diagnostic().to_string()
                },
            });
        }

        let total = offsets.len() as u32;
        let successes = offsets.iter().filter(|o| o.succeeded).count() as u32;
        let ok = total > 0 && successes == total;
        let partial = successes > 0 && successes < total;
        info!(probe = RANDOM_READ, successes, total, "random read");

        let diagnostic = offsets
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| format!("offset {}: {}", o.offset_bytes, o.diagnostic))
            .collect::<Vec<_>>()
            .join("; ");

        ProbeOutcome::new(RANDOM_READ, name, ok)
            .with_partial(partial)
            .with_measurements(Measurements {
                elapsed_seconds: Some(elapsed.as_secs_f64()),
                bytes_read: Some(offsets.iter().map(|o| o.bytes_read).sum()),
                offsets,
                successful_reads: Some(successes),
                failures: Some(total - successes),
                ..Default::default()
            })
            .with_diagnostic(diagnostic)
    }

    pub fn throughput(&self, device: &str) -> ProbeOutcome {
        let name = "Throughput Measurement";
        self.title(THROUGHPUT, name);

        let bytes = self.cfg.probes.throughput_read_bytes;
        let read = self.read(device, 0, bytes, self.cfg.timeouts.throughput());
        let speed = if read.complete {
            throughput_mibs(read.bytes_read, read.out.elapsed)
        } else {
            None
        };
        let ok = speed.is_some();

        let speed_status = speed.map(|s| {
            if s < self.cfg.probes.min_throughput_mibs {
                SpeedStatus::Degraded
            } else {
                SpeedStatus::Ok
            }
        });

        match (speed, speed_status) {
            (Some(s), Some(SpeedStatus::Degraded)) => {
                warn!(probe = THROUGHPUT, throughput_mibs = s, "throughput below threshold");
                self.console.print(
                    &format!(
                        "Speed: {s:.2} MiB/s, below {:.2} MiB/s; hardware may be degraded",
                        self.cfg.probes.min_throughput_mibs
                    ),
                    Level::Warning,
                );
            }
            (Some(s), _) => {
                info!(probe = THROUGHPUT, throughput_mibs = s, "throughput");
                self.result_line(true, &format!("Speed: {s:.2} MiB/s"));
            }
            (None, _) => {
                info!(probe = THROUGHPUT, ok = false, bytes_read = read.bytes_read, "throughput");
                self.result_line(
                    false,
                    &format!(
                        "Throughput measurement FAILED ({} of {bytes} bytes read)",
                        read.bytes_read
                    ),
                );
            }
        }

        ProbeOutcome::new(THROUGHPUT, name, ok)
            .with_measurements(Measurements {
                throughput_mibs: speed,
                speed_status,
                ..read.measurements()
            })
            .with_diagnostic(read.out.diagnostic())
    }

    /// Device size in bytes, or `None` when neither query yields a number.
    pub fn device_size(&self, device: &str) -> Option<u64> {
        let queries = [
            CommandSpec::new(&self.cfg.commands.blockdev).args(["--getsize64", device]),
            CommandSpec::new(&self.cfg.commands.lsblk).args(["-b", "-d", "-n", "-o", "SIZE", device]),
        ];
        queries.iter().find_map(|cmd| {
            let out = self.runner.run(cmd, self.cfg.timeouts.device_size());
            if out.succeeded {
                out.stdout.trim().parse::<u64>().ok()
            } else {
                None
            }
        })
    }
}
