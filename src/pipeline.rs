use crate::{
    config::Config,
    console::{Console, Level},
    exec::CommandRunner,
    probe::ProbeRunner,
    report::RunReport,
    util::now_rfc3339,
    verdict::{announce, determine_final_status},
};
use anyhow::Result;
use std::time::Instant;
use tracing::info;

pub struct ReadabilityTest<'a> {
    cfg: &'a Config,
    runner: &'a dyn CommandRunner,
    console: &'a dyn Console,
    dry_run: bool,
}

impl<'a> ReadabilityTest<'a> {
    pub fn new(cfg: &'a Config, runner: &'a dyn CommandRunner, console: &'a dyn Console) -> Self {
        Self {
            cfg,
            runner,
            console,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Probes `device`, then concludes the report with a verdict.
    pub fn run(&self, device: &str, case_id: &str) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(case_id, device, now_rfc3339(), self.dry_run);

        self.banner(device, case_id);
        info!(
            case_id,
            device,
            timestamp = report.timestamp(),
            dry_run = report.dry_run(),
            "readability test started"
        );

        ProbeRunner::new(self.cfg, self.runner, self.console).run(&mut report);

        let verdict = determine_final_status(report.outcomes());
        info!(
            status = %verdict.status,
            next_step = ?verdict.next_step,
            probes = report.outcomes().len(),
            elapsed = ?started.elapsed(),
            "readability test finished"
        );
        if self.cfg.output.print_summary {
            announce(self.console, &verdict);
        }
        report.conclude(verdict)?;
        Ok(report)
    }

    fn banner(&self, device: &str, case_id: &str) {
        let rule = "=".repeat(70);
        self.console.print(&rule, Level::Title);
        self.console.print(
            &format!(
                "MEDIA READABILITY TEST v{} | Case: {case_id} | {device}",
                env!("CARGO_PKG_VERSION")
            ),
            Level::Title,
        );
        if self.dry_run {
            self.console.print("MODE: DRY-RUN", Level::Warning);
        }
        self.console.print(&rule, Level::Title);
    }
}
