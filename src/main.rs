//! wlanscope CLI entry point.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use wlanscope::cli::{Args, Command, OutputFormatter, Rows};
use wlanscope::frame::beacon;
use wlanscope::io::scan_beacons;
use wlanscope::pcap::{self, ivs, CaptureRecord, ContainerKind, IvsContainer, PcapContainer, PcapRecordHeader};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let filter = args.log_filter();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();

    let formatter = OutputFormatter::new(args.format);

    let rows = match &args.command {
        Command::Info { file } => info(file)?,
        Command::Records { file, start, count } => records(file, *start, *count)?,
        Command::Beacons { file, chunk } => beacons(file, *chunk)?,
        Command::Concat {
            first,
            second,
            output,
        } => {
            concat(first, second, output)?;
            return Ok(());
        }
    };

    formatter
        .write(&rows, &mut io::stdout())
        .context("Failed to write output")?;
    Ok(())
}

fn detect(file: &Path) -> Result<ContainerKind> {
    ContainerKind::detect(file).with_context(|| format!("Failed to open container: {}", file.display()))
}

fn open_pcap(file: &Path) -> Result<PcapContainer> {
    PcapContainer::open(file).with_context(|| format!("Failed to open pcap file: {}", file.display()))
}

fn open_ivs(file: &Path) -> Result<IvsContainer> {
    IvsContainer::open(file).with_context(|| format!("Failed to open ivs file: {}", file.display()))
}

fn info(file: &Path) -> Result<Rows> {
    let mut rows = Rows::new(&["kind", "link_type", "records", "truncated", "snaplen"]);
    match detect(file)? {
        ContainerKind::Pcap => {
            let container = open_pcap(file)?;
            rows.push(vec![
                json!(ContainerKind::Pcap),
                json!(container.link_type().to_string()),
                json!(container.len()),
                json!(container.index().is_truncated()),
                json!(container.snaplen()),
            ]);
        }
        ContainerKind::Ivs => {
            let container = open_ivs(file)?;
            rows.push(vec![
                json!(ContainerKind::Ivs),
                Value::Null,
                json!(container.len()),
                json!(container.index().is_truncated()),
            ]);
        }
    }
    Ok(rows)
}

fn records(file: &Path, start: u64, count: usize) -> Result<Rows> {
    let mut rows = Rows::new(&["seq", "offset", "length", "timestamp_us", "bssid", "ssid"]);

    match detect(file)? {
        ContainerKind::Pcap => {
            let mut container = open_pcap(file)?;
            let link_type = container.link_type();
            for record in container.read_records(start, count)? {
                let timestamp = PcapRecordHeader::parse(&record.header).map(|h| h.timestamp_us());
                rows.push(vec![
                    json!(record.seq),
                    json!(record.offset),
                    json!(record.payload.len()),
                    json!(timestamp),
                    json!(beacon::beacon_bssid(&record.payload, link_type)),
                    json!(beacon::beacon_ssid(&record.payload, link_type)),
                ]);
            }
        }
        ContainerKind::Ivs => {
            let mut container = open_ivs(file)?;
            for record in container.read_records(start, count)? {
                let (bssid, ssid) = ivs_names(&record);
                rows.push(vec![
                    json!(record.seq),
                    json!(record.offset),
                    json!(record.payload.len()),
                    Value::Null,
                    bssid,
                    ssid,
                ]);
            }
        }
    }
    Ok(rows)
}

fn ivs_names(record: &CaptureRecord) -> (Value, Value) {
    match ivs::bssid_ssid(record) {
        Some((bssid, ssid)) => (json!(bssid), json!(ssid)),
        None => (Value::Null, Value::Null),
    }
}

fn beacons(file: &Path, chunk: usize) -> Result<Rows> {
    let networks = match detect(file)? {
        ContainerKind::Pcap => scan_beacons(&mut open_pcap(file)?, chunk)?,
        ContainerKind::Ivs => open_ivs(file)?.access_points()?,
    };

    let mut rows = Rows::new(&["bssid", "ssid"]);
    for (bssid, ssid) in networks {
        rows.push(vec![json!(bssid), json!(ssid)]);
    }
    Ok(rows)
}

fn concat(first: &Path, second: &Path, output: &Path) -> Result<()> {
    let kind = detect(first)?;
    let other = detect(second)?;
    if kind != other {
        bail!("Cannot concatenate a {kind} file with a {other} file");
    }

    match kind {
        ContainerKind::Pcap => pcap::concat(first, second, output),
        ContainerKind::Ivs => ivs::concat(first, second, output),
    }
    .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!("Wrote {} to {}", kind, output.display());
    Ok(())
}
