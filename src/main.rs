use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use crossterm::style::Stylize;
use treetop_sampler::config::{
    self, ConfigError, load_config, load_config_from_path, report_ignored,
};
use treetop_sampler::logging::init_logging;
use treetop_sampler::monitor::{Monitor, RunEnd};
use treetop_sampler::output::{Emitter, Format, HEADER};
use treetop_sampler::system::error::SampleError;
use treetop_sampler::system::kill::{SysinfoSignaller, parse_signal};
use treetop_sampler::system::platform::ProcFs;

#[derive(Parser)]
#[command(
    name = "treetop",
    version,
    about = "Sample CPU and PSS memory of a process subtree, and kill it past hard limits"
)]
struct Cli {
    /// Root of the observed subtree [default: 1]
    pid: Option<u32>,

    /// Kill the subtree once its total PSS exceeds this many MB
    #[arg(short = 'm', long)]
    memory_limit: Option<u64>,

    /// Kill the subtree once its total CPU exceeds this percentage
    #[arg(short = 'c', long)]
    cpu_limit: Option<f64>,

    /// Kill the subtree once it holds more than this many processes
    #[arg(short = 'p', long)]
    pid_limit: Option<usize>,

    /// Sample the root process only
    #[arg(short = 's', long)]
    single: bool,

    /// Minimum cycle duration in milliseconds
    #[arg(short = 't', long)]
    delay: Option<u64>,

    /// Report 0 MB for processes whose memory maps are unreadable
    #[arg(short = 'i', long)]
    ignore_errors: bool,

    /// Pids whose subtrees are not sampled (repeatable, comma-separated)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<u32>,

    /// Keep sampling until interrupted
    #[arg(short = 'r', long)]
    repeat: bool,

    /// Emit one compact JSON array per cycle
    #[arg(short = 'j', long)]
    json: bool,

    /// Termination signal: kill, term
    #[arg(long)]
    signal: Option<String>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter for stderr diagnostics (e.g. debug)
    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (config, ignored) = load_config_for_cli(&cli);
    init_logging(&config.logging.level, config.logging.json)?;
    if let Some(err) = &ignored {
        report_ignored(err);
    }
    tracing::debug!(?config, "configuration loaded");

    let json = config.general.json;
    let format = if json { Format::Json } else { Format::Table };
    let stdout = io::stdout();
    let clear_screen = config.general.repeat && stdout.is_terminal();
    let mut emitter = Emitter::new(stdout.lock(), format, clear_screen);

    let settings = config.settings();
    if settings.limits.is_unbounded() {
        tracing::debug!("no resource ceilings configured, reporting only");
    }
    let signaller = SysinfoSignaller::new(parse_signal(&config.limits.signal));
    let mut monitor = Monitor::new(ProcFs::new(), signaller, settings);

    let outcome = monitor.run(|report| -> Result<()> {
        emitter.emit(report)?;
        Ok(())
    });

    match outcome {
        Ok(RunEnd::Finished | RunEnd::Terminated(_)) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            let fatal = err
                .downcast_ref::<SampleError>()
                .and_then(|e| e.exit_code(json).map(|code| (e, code)));
            match fatal {
                Some((_, 0)) => Ok(ExitCode::SUCCESS),
                Some((e, code)) => {
                    report_fatal(e);
                    Ok(ExitCode::from(code))
                }
                None => Err(err),
            }
        }
    }
}

fn report_fatal(err: &SampleError) {
    let label = if io::stderr().is_terminal() {
        "Error".red().to_string()
    } else {
        "Error".to_string()
    };
    eprintln!("{HEADER}");
    eprintln!("{label}: {err}");
}

/// File config with CLI overrides applied. An unusable file falls back to the
/// defaults and is handed back for reporting after logging starts.
fn load_config_for_cli(cli: &Cli) -> (config::Config, Option<ConfigError>) {
    let loaded = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    let (mut config, ignored) = match loaded {
        Ok(config) => (config, None),
        Err(err) => (config::Config::default(), Some(err)),
    };

    if let Some(pid) = cli.pid {
        config.general.root_pid = pid;
    }
    if cli.single {
        config.general.recurse = false;
    }
    if let Some(delay) = cli.delay {
        config.general.delay_ms = delay;
    }
    if cli.repeat {
        config.general.repeat = true;
    }
    if cli.json {
        config.general.json = true;
    }
    if cli.ignore_errors {
        config.general.ignore_permission_errors = true;
    }
    if let Some(limit) = cli.memory_limit {
        config.limits.memory_mb = limit;
    }
    if let Some(limit) = cli.cpu_limit {
        config.limits.cpu_percent = limit;
    }
    if let Some(limit) = cli.pid_limit {
        config.limits.pid_count = limit;
    }
    config.limits.exclude_pids.extend(cli.exclude.iter().copied());
    if let Some(ref signal) = cli.signal {
        config.limits.signal = signal.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.json = true;
    }

    (config, ignored)
}
