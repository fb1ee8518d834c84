use clap::{Args, Parser, Subcommand};
use cts_serial_runner::config::{Config, ConfigLoader, ConfigResult};
use cts_serial_runner::report::analyze::{analyze_report, default_output_path, AnalyzeOptions};
use cts_serial_runner::{execute, logging, CancelToken, RunError, SystemPortOpener, TestTree};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "cts_serial_runner",
    version,
    about = "Runs a conformance test suite group by group on a serial-console device.",
    long_about = "Parses a case-list XML, sends one command per leaf test group over the device's serial console, classifies each group from the console output and power-cycles the device through a relay board between groups. Results land in a CSV report plus one log per group."
)]
struct Cli {
    /// Configuration file. Without it the usual locations are searched.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every leaf group on the device.
    Run(RunArgs),
    /// Browse a case list without touching any device.
    Inspect(InspectArgs),
    /// Add crash reasons from group logs to a finished report.
    Analyze(AnalyzeArgs),
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Case-list XML file
    #[arg(short, long)]
    file: PathBuf,

    /// Device console port, e.g. /dev/ttyUSB0 or COM3
    #[arg(long)]
    test_port: Option<String>,

    /// Device console baud rate [default: 921600]
    #[arg(long)]
    test_baudrate: Option<u32>,

    /// Per-attempt wait in seconds [default: 10]
    #[arg(long, value_parser = parse_seconds)]
    test_timeout: Option<Duration>,

    /// Relay board port; resets are skipped without it
    #[arg(long)]
    reset_port: Option<String>,

    /// Relay board baud rate [default: 9600]
    #[arg(long)]
    reset_baudrate: Option<u32>,

    /// Seconds to wait for the device to boot after a reset [default: 5]
    #[arg(long, value_parser = parse_seconds)]
    reset_wait: Option<Duration>,

    /// Silent cycles tolerated before a group is given up [default: 10]
    #[arg(long)]
    max_wait_count: Option<u32>,

    /// Resume at the first leaf group whose path contains this string
    #[arg(long)]
    start_group: Option<String>,

    /// Output directory [default: logs_<timestamp>]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Mirror raw device output to stdout
    #[arg(long)]
    print_output: bool,
}

impl RunArgs {
    /// Flags win over file and environment values.
    fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.test_port {
            config.device.port = Some(port.clone());
        }
        if let Some(baud) = self.test_baudrate {
            config.device.baud_rate = baud;
        }
        if let Some(timeout) = self.test_timeout {
            config.device.timeout_ms = millis(timeout);
        }
        if let Some(port) = &self.reset_port {
            config.recovery.port = Some(port.clone());
        }
        if let Some(baud) = self.reset_baudrate {
            config.recovery.baud_rate = baud;
        }
        if let Some(wait) = self.reset_wait {
            config.recovery.settle_ms = millis(wait);
        }
        if let Some(count) = self.max_wait_count {
            config.orchestration.max_wait_attempts = count;
        }
        if let Some(dir) = &self.log_dir {
            config.report.output_dir = Some(dir.clone());
        }
        if self.print_output {
            config.report.echo_device_output = true;
        }
    }
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Case-list XML file
    #[arg(short, long)]
    file: PathBuf,

    /// Deepest level shown in the structure outline (roots are 0)
    #[arg(short, long)]
    depth: Option<usize>,

    /// List all executable test paths
    #[arg(long, group = "listing")]
    list_tests: bool,

    /// List all group paths
    #[arg(long, group = "listing")]
    list_groups: bool,

    /// List the leaf groups a run would dispatch
    #[arg(long, group = "listing")]
    list_leaf_groups: bool,

    /// Show counts only
    #[arg(long, group = "listing")]
    summary: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// test_report.csv of a finished run
    csv_file: PathBuf,

    /// Output file [default: <input>_with_reasons.csv]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Result whose rows are inspected
    #[arg(long, default_value = "CRASH")]
    result: String,

    /// Line marker to extract [default: report.crash_reason_marker]
    #[arg(long)]
    marker: Option<String>,
}

fn load_config(path: Option<&Path>) -> ConfigResult<Config> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader.into_config())
}

fn run(args: &RunArgs, config: &Config) -> ExitCode {
    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        warn!(error = %e, "Ctrl-C handler not installed, interruption will kill the run");
    }

    match execute(
        config,
        &args.file,
        args.start_group.as_deref(),
        &SystemPortOpener,
        cancel,
    ) {
        Ok(output) => {
            info!(dir = %output.output_dir.display(), "run finished");
            ExitCode::SUCCESS
        }
        Err(RunError::StartGroupNotFound {
            requested,
            suggestions,
        }) => {
            error!("Start group '{requested}' not found in test groups");
            if suggestions.is_empty() {
                info!("No groups contain '{requested}'");
            } else {
                info!("Available groups containing the keyword:");
                for path in &suggestions {
                    info!("  - {path}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn inspect(args: &InspectArgs) -> ExitCode {
    let tree = match TestTree::from_file(&args.file) {
        Ok(tree) => tree,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let paths = if args.list_tests {
        Some(tree.all_leaf_paths())
    } else if args.list_groups {
        Some(tree.all_group_paths())
    } else if args.list_leaf_groups {
        Some(tree.leaf_group_paths())
    } else {
        None
    };
    if let Some(paths) = paths {
        for path in &paths {
            println!("{path}");
        }
        println!("\nTotal: {}", paths.len());
        return ExitCode::SUCCESS;
    }

    println!("Package: {}", tree.package());
    println!("Total Groups: {}", tree.group_count());
    println!("Total Tests: {}", tree.test_count());
    println!("Leaf Groups: {}", tree.leaf_group_paths().len());
    if !args.summary {
        println!("{}", "-".repeat(60));
        for line in tree.outline(args.depth) {
            println!("{line}");
        }
    }
    ExitCode::SUCCESS
}

fn analyze(args: &AnalyzeArgs, config: &Config) -> ExitCode {
    if !args.csv_file.exists() {
        error!("CSV file not found: {}", args.csv_file.display());
        return ExitCode::FAILURE;
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.csv_file));
    let options = AnalyzeOptions {
        result: args.result.clone(),
        marker: args
            .marker
            .clone()
            .unwrap_or_else(|| config.report.crash_reason_marker.clone()),
    };

    match analyze_report(&args.csv_file, &output, &options) {
        Ok(analysis) => {
            println!("Analysis complete:");
            println!("  Total {} entries: {}", options.result, analysis.reasons.len());
            println!("  Output saved to: {}", analysis.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Command::Run(args) = &cli.command {
        args.apply(&mut config);
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("warning: logging not initialised: {e}");
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    match &cli.command {
        Command::Run(args) => run(args, &config),
        Command::Inspect(args) => inspect(args),
        Command::Analyze(args) => analyze(args, &config),
    }
}
