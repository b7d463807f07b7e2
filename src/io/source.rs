//! Frame sources over stored containers, and the scan drivers built on them.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};

use crate::dissect::DissectionClient;
use crate::error::Result;
use crate::frame::{beacon, FrameRecord};
use crate::pcap::{CaptureRecord, LinkType, PcapContainer};
use crate::registry::{ApRegistry, FrameOutcome};

/// Sequential reader of frames.
///
/// Offline containers and live feeds both end up as a stream of
/// [`FrameRecord`]s; the registry does not care which.
pub trait FrameReader: Send {
    /// Read the next frame. Returns `Ok(None)` at the end of the source.
    fn next_frame(&mut self) -> Result<Option<FrameRecord>>;

    /// Link type of the frames this reader produces.
    fn link_type(&self) -> LinkType;

    /// Read up to `max` frames at once. The buffer is cleared first.
    ///
    /// Returns the number of frames read (0 means end of source).
    #[inline]
    fn read_batch(&mut self, buffer: &mut Vec<FrameRecord>, max: usize) -> Result<usize> {
        buffer.clear();
        buffer.reserve(max);
        while buffer.len() < max {
            match self.next_frame()? {
                Some(frame) => buffer.push(frame),
                None => break,
            }
        }
        Ok(buffer.len())
    }
}

/// Frames of a pcap container, fetched from its index in fixed-size chunks.
pub struct ContainerFrames<'a> {
    container: &'a mut PcapContainer,
    next_seq: u64,
    chunk: usize,
    pending: VecDeque<CaptureRecord>,
}

impl<'a> ContainerFrames<'a> {
    /// Iterate from the first record, reading `chunk` records per index lookup.
    pub fn new(container: &'a mut PcapContainer, chunk: usize) -> Self {
        Self {
            container,
            next_seq: 1,
            chunk: chunk.max(1),
            pending: VecDeque::new(),
        }
    }

    /// Sequence number of the next frame to be returned.
    pub fn position(&self) -> u64 {
        self.next_seq - self.pending.len() as u64
    }

    fn refill(&mut self) -> Result<()> {
        if self.next_seq > self.container.len() as u64 {
            return Ok(());
        }
        let records = self.container.read_records(self.next_seq, self.chunk)?;
        self.next_seq += records.len() as u64;
        self.pending.extend(records);
        Ok(())
    }
}

impl FrameReader for ContainerFrames<'_> {
    fn next_frame(&mut self) -> Result<Option<FrameRecord>> {
        if self.pending.is_empty() {
            self.refill()?;
        }
        let link_type = self.container.link_type();
        Ok(self
            .pending
            .pop_front()
            .map(|record| FrameRecord::from_capture(&record, link_type)))
    }

    fn link_type(&self) -> LinkType {
        self.container.link_type()
    }
}

/// Totals of one container scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub frames: u64,
    pub skipped: u64,
}

/// Feed every frame of `container` through `registry`.
///
/// Container errors abort the scan; per-frame decode errors only count as skipped.
pub fn scan_container<C: DissectionClient>(
    registry: &ApRegistry<C>,
    container: &mut PcapContainer,
    chunk: usize,
) -> Result<ScanSummary> {
    let mut reader = ContainerFrames::new(container, chunk);
    let mut summary = ScanSummary::default();
    let mut batch = Vec::new();

    while reader.read_batch(&mut batch, chunk.max(1))? > 0 {
        for frame in batch.drain(..) {
            summary.frames += 1;
            if registry.on_frame(frame) == FrameOutcome::Skipped {
                summary.skipped += 1;
            }
        }
    }

    info!(frames = summary.frames, skipped = summary.skipped, "container scan finished");
    Ok(summary)
}

/// BSSID to SSID map of every beacon in `container`, read without the dissector.
///
/// A hidden (empty) SSID never replaces a known one.
pub fn scan_beacons(container: &mut PcapContainer, chunk: usize) -> Result<BTreeMap<String, String>> {
    let link_type = container.link_type();
    let total = container.len() as u64;
    let chunk = chunk.max(1);
    let mut networks: BTreeMap<String, String> = BTreeMap::new();

    let mut seq = 1;
    while seq <= total {
        let records = container.read_records(seq, chunk)?;
        if records.is_empty() {
            break;
        }
        seq += records.len() as u64;

        for record in &records {
            let (Some(bssid), Some(ssid)) = (
                beacon::beacon_bssid(&record.payload, link_type),
                beacon::beacon_ssid(&record.payload, link_type),
            ) else {
                continue;
            };
            let known = networks.entry(bssid).or_default();
            if !ssid.is_empty() || known.is_empty() {
                *known = ssid;
            }
        }
        debug!(scanned = seq - 1, total, networks = networks.len(), "beacon scan progress");
    }

    Ok(networks)
}
