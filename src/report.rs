use crate::{
    probe::ProbeOutcome,
    util::ensure_dir,
    verdict::{MediaStatus, Verdict},
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Record of one readability run. Outcomes are append-only and the verdict
/// fields are written exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    case_id: String,
    device: String,
    timestamp: String,
    tool_version: String,
    dry_run: bool,
    device_size_bytes: Option<u64>,
    tests: Vec<ProbeOutcome>,
    status: Option<MediaStatus>,
    recommendation: Option<String>,
    recommended_tool: Option<String>,
    next_step: Option<u8>,
}

impl RunReport {
    pub fn new(case_id: &str, device: &str, timestamp: String, dry_run: bool) -> Self {
        Self {
            case_id: case_id.to_string(),
            device: device.to_string(),
            timestamp,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            dry_run,
            device_size_bytes: None,
            tests: Vec::new(),
            status: None,
            recommendation: None,
            recommended_tool: None,
            next_step: None,
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn device_size_bytes(&self) -> Option<u64> {
        self.device_size_bytes
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.tests
    }

    pub fn status(&self) -> Option<MediaStatus> {
        self.status
    }

    pub fn recommendation(&self) -> Option<&str> {
        self.recommendation.as_deref()
    }

    pub fn next_step(&self) -> Option<u8> {
        self.next_step
    }

    pub fn is_concluded(&self) -> bool {
        self.status.is_some()
    }

    pub(crate) fn record(&mut self, outcome: ProbeOutcome) {
        debug_assert!(!self.is_concluded(), "outcome recorded after verdict");
        self.tests.push(outcome);
    }

    pub(crate) fn set_device_size(&mut self, size: Option<u64>) {
        self.device_size_bytes = size;
    }

    /// Sets status, recommendation and next step. Fails if already set.
    pub fn conclude(&mut self, verdict: Verdict) -> Result<()> {
        if let Some(status) = self.status {
            bail!("run report already concluded with status {status}");
        }
        self.status = Some(verdict.status);
        self.recommendation = Some(verdict.recommendation);
        self.recommended_tool = verdict.recommended_tool;
        self.next_step = verdict.next_step;
        Ok(())
    }
}

/// Destination for a concluded report.
pub trait ReportSink {
    /// Returns the written path when the sink is file-backed.
    fn persist(&self, report: &RunReport) -> Result<Option<PathBuf>>;
}

/// Writes `<case_id><suffix>` under a directory, one file per case.
pub struct JsonFileSink {
    output_dir: PathBuf,
    suffix: String,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            suffix: suffix.into(),
        }
    }

    pub fn path_for(&self, case_id: &str) -> PathBuf {
        report_path(&self.output_dir, case_id, &self.suffix)
    }
}

impl ReportSink for JsonFileSink {
    fn persist(&self, report: &RunReport) -> Result<Option<PathBuf>> {
        if !report.is_concluded() {
            bail!("refusing to persist a report without a verdict");
        }
        ensure_dir(&self.output_dir)?;
        let path = self.path_for(report.case_id());
        let body = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, body)
            .with_context(|| format!("writing report: {}", path.display()))?;
        info!("report saved: {}", path.display());
        Ok(Some(path))
    }
}

/// Prints the report JSON on stdout.
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn persist(&self, report: &RunReport) -> Result<Option<PathBuf>> {
        if !report.is_concluded() {
            bail!("refusing to persist a report without a verdict");
        }
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(None)
    }
}

pub fn report_path(output_dir: &Path, case_id: &str, suffix: &str) -> PathBuf {
    output_dir.join(format!("{}{}", file_stem(case_id), suffix))
}

/// Escapes a case identifier into a file name. `%` is escaped too, so the
/// mapping stays one-to-one.
pub fn file_stem(case_id: &str) -> String {
    let mut out = String::with_capacity(case_id.len());
    for b in case_id.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    if out.starts_with('.') {
        out.replace_range(0..1, "%2E");
    }
    out
}
