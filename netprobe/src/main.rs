mod config;
mod logging;
mod report;

use clap::{ArgAction, Parser, Subcommand};
use config::{config_path, get_default_config_toml, load_config, Config};
use libnetprobe::{
    bgp_origins, dedup_targets, lookup_nameservers, ping_many, read_targets, BgpStateProbe, DnsLookup, PingProbe,
};
use std::{
    error::Error,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(about = "Batch network probing - NS lookups, ICMP reachability and BGP origin lookups", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print the default config to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up NS records for every domain in the file
    Dns(ProbeArgs),
    /// Send ICMP echo requests to every host in the file
    Ping(ProbeArgs),
    /// Fetch the BGP origin AS and prefix for every IP in the file
    Bgp(ProbeArgs),
}

#[derive(clap::Args, Debug)]
struct ProbeArgs {
    /// File with one target per line
    #[arg(short, long)]
    file: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long)]
    worker: Option<NonZeroUsize>,

    /// Where to write the JSON report (defaults to <input stem>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Probe each distinct target once
    #[arg(long)]
    dedup: bool,

    /// Print results to stdout instead of writing a report file
    #[arg(long, conflicts_with = "output")]
    print: bool,
}

/// Resolved per-run settings handed to a probe driver.
#[derive(Debug)]
struct RunSettings {
    input: PathBuf,
    output: PathBuf,
    workers: NonZeroUsize,
    dedup: bool,
    print: bool,
}

impl RunSettings {
    fn new(args: ProbeArgs, default_workers: NonZeroUsize) -> Self {
        let output = args
            .output
            .unwrap_or_else(|| report::output_path_for(&args.file));
        Self {
            input: args.file,
            output,
            workers: args.worker.unwrap_or(default_workers),
            dedup: args.dedup,
            print: args.print,
        }
    }

    fn load_targets(&self) -> Result<Vec<String>, libnetprobe::TargetError> {
        let targets = read_targets(&self.input)?;
        if !self.dedup {
            return Ok(targets);
        }
        let before = targets.len();
        let targets = dedup_targets(targets);
        if targets.len() < before {
            info!(removed = before - targets.len(), "dropped duplicate targets");
        }
        Ok(targets)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", get_default_config_toml());
        return Ok(());
    }

    if args.write_default_config {
        if let Some(path) = config_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, get_default_config_toml())?;
            println!("Default config written to: {}", path.display());
        } else {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
        return Ok(());
    }

    let Some(command) = args.command else {
        eprintln!("Error: a probe subcommand is required (dns, ping or bgp); see --help");
        std::process::exit(2);
    };

    logging::initialize_logging(args.verbose, args.quiet);
    let config = load_config(args.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match command {
            Command::Dns(probe_args) => {
                let settings = RunSettings::new(probe_args, config.dns.workers);
                run_dns(settings, &config).await
            }
            Command::Ping(probe_args) => {
                let settings = RunSettings::new(probe_args, config.ping.workers);
                run_ping(settings, &config).await
            }
            Command::Bgp(probe_args) => {
                let settings = RunSettings::new(probe_args, config.bgp.workers);
                run_bgp(settings, &config).await
            }
        }
    })
}

fn log_elapsed(name: &str, started: Instant) {
    info!(elapsed = ?started.elapsed(), "{name} took");
}

fn report_destination(path: &Path) {
    info!(path = %path.display(), "report written");
}

async fn run_dns(settings: RunSettings, config: &Config) -> Result<(), Box<dyn Error>> {
    let started = Instant::now();
    let dns_config = config.dns.to_config()?;
    let targets = settings.load_targets()?;
    info!(targets = targets.len(), workers = settings.workers.get(), resolver = %dns_config.resolver, "starting NS lookups");

    let done = lookup_nameservers(targets, dns_config, settings.workers).await;

    let records: Vec<_> = done.iter().filter_map(DnsLookup::record).collect();
    let failed = done.len() - records.len();
    if failed > 0 {
        warn!(failed, "domains without nameservers omitted from report");
    }

    if settings.print {
        report::print_dns(&records)?;
    } else {
        report::write_json(&settings.output, &records)?;
        report_destination(&settings.output);
    }
    log_elapsed("dns", started);
    Ok(())
}

async fn run_ping(settings: RunSettings, config: &Config) -> Result<(), Box<dyn Error>> {
    let started = Instant::now();
    let targets = settings.load_targets()?;
    info!(targets = targets.len(), workers = settings.workers.get(), "starting ping sweep");

    let done = ping_many(targets, config.ping.to_config(), settings.workers).await;

    let records: Vec<_> = done.iter().map(PingProbe::record).collect();
    let reachable = done.iter().filter(|p| p.is_reachable()).count();
    let unreachable = done.len() - reachable;

    if settings.print {
        report::print_ping(&records)?;
    } else {
        report::write_json(&settings.output, &records)?;
        report_destination(&settings.output);
    }
    report::print_ping_summary(reachable, unreachable)?;
    log_elapsed("ping", started);
    Ok(())
}

async fn run_bgp(settings: RunSettings, config: &Config) -> Result<(), Box<dyn Error>> {
    let started = Instant::now();
    let bgp_config = config.bgp.to_config();
    let targets = settings.load_targets()?;
    info!(targets = targets.len(), workers = settings.workers.get(), api = %bgp_config.api_host, "starting BGP state lookups");

    let done = bgp_origins(targets, bgp_config, settings.workers).await?;

    let records: Vec<_> = done.iter().filter_map(BgpStateProbe::record).collect();
    let failed = done.len() - records.len();
    if failed > 0 {
        warn!(failed, "IPs without BGP state omitted from report");
    }

    if settings.print {
        report::print_bgp(&records)?;
    } else {
        report::write_json(&settings.output, &records)?;
        report_destination(&settings.output);
    }
    log_elapsed("bgp", started);
    Ok(())
}
