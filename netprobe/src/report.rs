use console::style;
use libnetprobe::{BgpRecord, DnsRecord, PingRecord};
use serde::Serialize;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `targets/ips.txt` becomes `targets/ips.json`; everything after the first dot is dropped.
pub fn output_path_for(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().filter(|s| !s.is_empty()).unwrap_or("report");
    input.with_file_name(format!("{stem}.json"))
}

pub fn write_json<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ReportError> {
    let encoded = serde_json::to_vec(records)?;
    std::fs::write(path, encoded).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn print_dns(records: &[DnsRecord]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for record in records {
        writeln!(out, "Domain: {}", style(&record.domain).cyan())?;
        writeln!(out, "Nameservers:")?;
        for ns in &record.nameservers {
            writeln!(out, "- {ns}")?;
        }
        writeln!(out)?;
    }
    out.flush()
}

pub fn print_ping(records: &[PingRecord]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for record in records {
        if record.reachable {
            let avg = record.rtts_ms.iter().sum::<f64>() / record.rtts_ms.len() as f64;
            writeln!(
                out,
                "{} {:<40} {}/{} replies, avg {:.2} ms",
                style("✓").green().bold(),
                record.ip,
                record.received,
                record.sent,
                avg
            )?;
        } else {
            writeln!(out, "{} {:<40} no reply", style("✗").red().bold(), record.ip)?;
        }
    }
    out.flush()
}

pub fn print_bgp(records: &[BgpRecord]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for record in records {
        writeln!(
            out,
            "{:<40} {:<20} AS{}",
            style(&record.ip).cyan(),
            record.target_prefix,
            record.origin_as
        )?;
    }
    out.flush()
}

pub fn print_ping_summary(reachable: usize, unreachable: usize) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "Number of IPs that pinged: {}", style(reachable).green())?;
    writeln!(out, "Number of IPs that did not ping: {}", style(unreachable).red())?;
    out.flush()
}
