use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub commands: Commands,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub probes: Probes,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub console: Console,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    /// Rejects read geometry the probes cannot express as whole sectors.
    pub fn validate(&self) -> Result<()> {
        let sector = self.probes.sector_size;
        if sector == 0 {
            bail!("probes.sector_size must be > 0");
        }
        for (key, bytes) in [
            ("probes.sequential_read_bytes", self.probes.sequential_read_bytes),
            ("probes.throughput_read_bytes", self.probes.throughput_read_bytes),
        ] {
            if bytes == 0 || bytes % sector != 0 {
                bail!("{key} must be a non-zero multiple of sector_size ({sector}), got {bytes}");
            }
        }
        if self.device.required_prefix.is_empty() {
            bail!("device.required_prefix must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub output_dir: String,
    pub log_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            output_dir: "/var/forensics/reports".into(),
            log_dir: "/var/log/forensics".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Namespace every accepted device path must start with.
    pub required_prefix: String,
}
impl Default for Device {
    fn default() -> Self {
        Self {
            required_prefix: "/dev/".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Commands {
    pub lsblk: String,
    pub dd: String,
    pub blockdev: String,
}
impl Default for Commands {
    fn default() -> Self {
        Self {
            lsblk: "lsblk".into(),
            dd: "dd".into(),
            blockdev: "blockdev".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub device_presence_seconds: u64,
    pub first_sector_seconds: u64,
    pub sequential_read_seconds: u64,
    /// Applied to each offset separately.
    pub random_read_seconds: u64,
    pub throughput_seconds: u64,
    pub device_size_seconds: u64,
}
impl Default for Timeouts {
    fn default() -> Self {
        Self {
            device_presence_seconds: 30,
            first_sector_seconds: 30,
            sequential_read_seconds: 60,
            random_read_seconds: 30,
            throughput_seconds: 120,
            device_size_seconds: 30,
        }
    }
}

impl Timeouts {
    pub fn device_presence(&self) -> Duration {
        Duration::from_secs(self.device_presence_seconds)
    }
    pub fn first_sector(&self) -> Duration {
        Duration::from_secs(self.first_sector_seconds)
    }
    pub fn sequential_read(&self) -> Duration {
        Duration::from_secs(self.sequential_read_seconds)
    }
    pub fn random_read(&self) -> Duration {
        Duration::from_secs(self.random_read_seconds)
    }
    pub fn throughput(&self) -> Duration {
        Duration::from_secs(self.throughput_seconds)
    }
    pub fn device_size(&self) -> Duration {
        Duration::from_secs(self.device_size_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Probes {
    pub sector_size: u64,
    pub sequential_read_bytes: u64,
    pub throughput_read_bytes: u64,
    /// Fixed byte offsets for the random-access probe. Not derived from the
    /// device size.
    pub random_offsets: Vec<u64>,
    /// Throughput below this (MiB/s) is reported as degraded hardware.
    pub min_throughput_mibs: f64,
    pub query_device_size: bool,
}
impl Default for Probes {
    fn default() -> Self {
        Self {
            sector_size: 512,
            sequential_read_bytes: MIB,
            throughput_read_bytes: 10 * MIB,
            random_offsets: vec![0, GIB, 2 * GIB],
            min_throughput_mibs: 1.0,
            query_device_size: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    /// Appended to the case identifier to form the report file name.
    pub report_suffix: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            report_suffix: "_readability_test.json".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStyle {
    /// Rich output when stdout is a terminal, plain otherwise.
    #[default]
    Auto,
    Plain,
    Rich,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Console {
    pub style: ConsoleStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}
