use crate::{
    config::{Config, ConsoleStyle},
    console::{self, Level},
    exec::{CommandRunner, DryRunRunner, SystemRunner},
    input::{confirm_write_blocker, validate_case_id, validate_device_path, value_or_prompt},
    pipeline::ReadabilityTest,
    report::{JsonFileSink, ReportSink, StdoutSink},
    util::{ensure_dir, today_stamp},
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Exit code for validation failures, a declined write-blocker check and any
/// other error that prevents a verdict.
pub const EXIT_ABORTED: i32 = 99;

#[derive(Parser, Debug)]
#[command(name = "media-readability", version)]
#[command(about = "Forensic media readability diagnostic (5-stage read-only protocol)")]
pub struct Args {
    /// Block device path, e.g. /dev/sdb. Prompted for when omitted.
    pub device: Option<String>,

    /// Forensic case identifier. Prompted for when omitted.
    pub case_id: Option<String>,

    /// Report directory (overrides paths.output_dir).
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to config TOML. If omitted, uses ./media-readability.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Simulate every command without touching the device.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the write-blocker confirmation prompt.
    #[arg(long)]
    pub skip_wb_check: bool,

    /// Print the report JSON to stdout instead of writing a file.
    #[arg(short, long)]
    pub json: bool,

    /// Force the plain console formatter.
    #[arg(long)]
    pub plain: bool,
}

/// Runs the tool and returns the process exit code. Errors raised once
/// logging is up are logged here and mapped to [`EXIT_ABORTED`].
pub fn dispatch(args: Args) -> Result<i32> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = match &cfg_path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg, args.dry_run);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    if let Some(p) = &cfg_path {
        info!("config: {}", p.display());
    }

    match run(&args, &cfg) {
        Ok(code) => Ok(code),
        Err(err) => {
            error!("{:#}", err);
            Ok(EXIT_ABORTED)
        }
    }
}

fn run(args: &Args, cfg: &Config) -> Result<i32> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut prompt_out = std::io::stderr();

    let device = value_or_prompt(args.device.clone(), "Device path", &mut input, &mut prompt_out)?;
    validate_device_path(&device, &cfg.device.required_prefix)?;
    let case_id = value_or_prompt(args.case_id.clone(), "Case ID", &mut input, &mut prompt_out)?;
    let case_id = validate_case_id(&case_id)?;

    if args.dry_run || args.skip_wb_check {
        warn!("write-blocker confirmation skipped");
    } else if !confirm_write_blocker(&mut input, &mut prompt_out)? {
        bail!("write-blocker NOT confirmed, test aborted");
    }

    let style = if args.plain {
        ConsoleStyle::Plain
    } else {
        cfg.console.style
    };
    let console = console::select(style, args.json);

    let runner: Box<dyn CommandRunner> = if args.dry_run {
        Box::new(DryRunRunner::default())
    } else {
        Box::new(SystemRunner::new())
    };

    let report = ReadabilityTest::new(cfg, runner.as_ref(), console.as_ref())
        .dry_run(args.dry_run)
        .run(&device, &case_id)?;

    let sink: Box<dyn ReportSink> = if args.json {
        Box::new(StdoutSink)
    } else {
        let out_dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&cfg.paths.output_dir));
        Box::new(JsonFileSink::new(out_dir, cfg.output.report_suffix.clone()))
    };
    if let Some(path) = sink.persist(&report)? {
        console.print(&format!("Report saved: {}", path.display()), Level::Ok);
    }

    let status = report
        .status()
        .ok_or_else(|| anyhow!("report has no verdict"))?;
    Ok(status.exit_code())
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("media-readability.toml");
    default.exists().then_some(default)
}

fn resolve_log_path(cfg: &Config, dry_run: bool) -> Option<PathBuf> {
    if !cfg.logging.write_to_file || dry_run {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.log_dir).join(log_file_name()))
}

fn log_file_name() -> String {
    format!("media_readability_{}.log", today_stamp())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file: {}", path.display()))
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let mut fallback_note = None;
    let file = match file_path {
        Some(path) => match open_log_file(path) {
            Ok(f) => Some(f),
            Err(err) => {
                let fallback = std::env::temp_dir().join("forensics").join(log_file_name());
                fallback_note = Some(format!("{:#}; logging to {}", err, fallback.display()));
                Some(open_log_file(&fallback)?)
            }
        },
        None => None,
    };

    let (file_layer, guard) = if let Some(file) = file {
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    if let Some(note) = fallback_note {
        warn!("log file unavailable: {note}");
    }

    Ok(guard)
}
