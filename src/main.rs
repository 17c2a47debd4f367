// Tue Jan 13 2026 - Alex

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use icejobs::{
    config::Config,
    orchestration::{DiscoveryController, MonitorCoordinator, OutputFinalizer, RunReport, StatsAggregator},
    transport::BroadcastDiscovery,
    utils::logging,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Prints the number of compile jobs an Icecream cluster can take", long_about = None)]
struct Args {
    /// Network name to look for first (defaults to ICECREAM)
    #[arg(short, long)]
    netname: Option<String>,

    /// Milliseconds without a message before printing the total
    #[arg(short, long)]
    timeout: Option<u64>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    port: Option<u16>,

    /// Fail on malformed host stats instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Keep listening when the scheduler sends non-stats messages
    #[arg(long)]
    ignore_unhandled: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print the total and errors
    #[arg(short, long)]
    quiet: bool,

    #[arg(long)]
    no_progress: bool,

    #[arg(long)]
    no_color: bool,
}

fn main() {
    let args = Args::parse();

    if args.quiet {
        logging::LoggingUtils::init_logger(log::LevelFilter::Error, !args.no_color);
    } else {
        logging::init(args.verbose, !args.no_color);
    }

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {:#}", error_prefix(!args.no_color), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = OutputFinalizer::emit(&report, &mut io::stdout().lock()) {
        eprintln!("{} Failed to write total: {}", error_prefix(!args.no_color), e);
        std::process::exit(1);
    }
}

fn error_prefix(use_color: bool) -> String {
    if use_color {
        "[!]".red().to_string()
    } else {
        "[!]".to_string()
    }
}

fn run(args: &Args) -> Result<RunReport> {
    let config = build_config(args)?;

    let discovery = BroadcastDiscovery::new(config.scheduler_port, config.probe_timeout());
    let controller = DiscoveryController::new(discovery, &config, config.scheduler_override_from_env());
    let aggregator = StatsAggregator::from_config(&config);

    let mut coordinator = MonitorCoordinator::new(controller, aggregator, &config);
    if !args.quiet && !args.no_progress {
        coordinator = coordinator.with_progress(spinner()?);
    }

    let report = coordinator.run()?;
    Ok(report)
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(ref name) = args.netname {
        config = config.with_network_name(name.clone());
    }
    if let Some(ms) = args.timeout {
        config = config.with_idle_deadline(Duration::from_millis(ms));
    }
    if let Some(port) = args.port {
        config.scheduler_port = port;
    }
    if args.strict {
        config = config.with_strict_stats(true);
    }
    if args.ignore_unhandled {
        config = config.with_ignore_unhandled(true);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
