//! pcap container writer and concatenation.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::reader::{open_source, read_global_header, PCAP_GLOBAL_HEADER_LEN, PCAP_MAGIC};
use super::{CaptureRecord, LinkType, PcapRecordHeader, PCAP_RECORD_HEADER_LEN};
use crate::error::{CaptureError, Error, Result};
use crate::format::ByteView;

/// Snapshot length written into new global headers.
const SNAPLEN: u32 = 0xFFFF;

/// Build a pcap global header: version 2.4, zero timezone and sigfigs.
pub fn global_header(link_type: LinkType) -> [u8; PCAP_GLOBAL_HEADER_LEN] {
    let mut out = [0u8; PCAP_GLOBAL_HEADER_LEN];
    out[0..4].copy_from_slice(&PCAP_MAGIC.to_le_bytes());
    out[4..6].copy_from_slice(&2u16.to_le_bytes());
    out[6..8].copy_from_slice(&4u16.to_le_bytes());
    out[16..20].copy_from_slice(&SNAPLEN.to_le_bytes());
    out[20..24].copy_from_slice(&link_type.pcap().to_le_bytes());
    out
}

/// Streaming pcap writer.
///
/// The global header is deferred until the first record arrives and carries
/// that record's link type. In append mode against a file that already has a
/// header, no header is written at all.
pub struct PcapWriter<W: Write> {
    out: W,
    link_type: Option<LinkType>,
    records: u64,
}

impl PcapWriter<BufWriter<File>> {
    /// Create (or truncate) a pcap file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Open a pcap file for appending, creating it if missing.
    ///
    /// An existing header must be a valid pcap header; its link type is kept.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let len = file.metadata()?.len();
        let existing = if len == 0 {
            None
        } else {
            let header = read_global_header(&mut file, PCAP_GLOBAL_HEADER_LEN)
                .ok_or_else(|| Error::invalid_pcap("existing file has a truncated header"))?;
            Some(parse_header_link_type(&header)?)
        };
        file.seek(SeekFrom::End(0))?;

        debug!(path = %path.display(), existing = ?existing, "appending to pcap");
        Ok(Self {
            out: BufWriter::new(file),
            link_type: existing,
            records: 0,
        })
    }
}

impl<W: Write> PcapWriter<W> {
    /// Wrap a writer positioned at the start of an empty container.
    pub fn new(out: W) -> Self {
        Self {
            out,
            link_type: None,
            records: 0,
        }
    }

    /// Link type of the container, once known.
    pub fn link_type(&self) -> Option<LinkType> {
        self.link_type
    }

    /// Records written through this writer.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Write one frame.
    ///
    /// A 16-byte `header` whose captured length matches the payload is written
    /// verbatim; anything else (live headers, ivs headers) is replaced with a
    /// zero-timestamp header.
    ///
    /// Fails with `PayloadTooLarge` before writing anything when the payload
    /// length does not fit the captured-length field.
    pub fn write_frame(&mut self, header: &[u8], payload: &[u8], link_type: LinkType) -> Result<()> {
        let captured_len = captured_len(payload.len())?;
        match self.link_type {
            None => {
                self.out.write_all(&global_header(link_type))?;
                self.link_type = Some(link_type);
            }
            Some(existing) if existing != link_type => {
                warn!(%existing, %link_type, "writing frame with a different link type than the container");
            }
            Some(_) => {}
        }

        if reusable_header(header, captured_len) {
            self.out.write_all(header)?;
        } else {
            self.out.write_all(&PcapRecordHeader::for_payload(captured_len).to_bytes())?;
        }
        self.out.write_all(payload)?;
        self.records += 1;
        Ok(())
    }

    /// Write a record read from another container.
    pub fn write_capture(&mut self, record: &CaptureRecord, link_type: LinkType) -> Result<()> {
        self.write_frame(&record.header, &record.payload, link_type)
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

fn captured_len(payload_len: usize) -> Result<u32> {
    u32::try_from(payload_len).map_err(|_| Error::Capture(CaptureError::PayloadTooLarge { len: payload_len }))
}

fn reusable_header(header: &[u8], captured_len: u32) -> bool {
    header.len() == PCAP_RECORD_HEADER_LEN
        && PcapRecordHeader::parse(header).map_or(false, |h| h.captured_len == captured_len)
}

fn parse_header_link_type(header: &[u8]) -> Result<LinkType> {
    let view = ByteView::new(header);
    if view.u32_le(0) != Some(PCAP_MAGIC) {
        return Err(Error::invalid_pcap(format!(
            "unknown magic number: {:02x?}",
            view.slice(0, 4).unwrap_or_default()
        )));
    }
    let raw = view.u32_le(20).unwrap_or_default();
    LinkType::from_pcap(raw)
        .ok_or(Error::Capture(CaptureError::UnsupportedLinkType { link_type: raw }))
}

/// Write `records` to a new pcap file at `path`.
///
/// Returns the number of records written. An empty slice produces an empty
/// file, since the header waits for the first record.
pub fn write<P: AsRef<Path>>(path: P, records: &[CaptureRecord], link_type: LinkType) -> Result<u64> {
    let mut writer = PcapWriter::create(path)?;
    for record in records {
        writer.write_capture(record, link_type)?;
    }
    let written = writer.records_written();
    writer.finish()?;
    Ok(written)
}

/// Concatenate two pcap files into `dest`.
///
/// `a` is copied verbatim; `b` is appended without its global header. Both
/// inputs must be valid pcap files. Differing link types are logged, not
/// rejected.
pub fn concat<A, B, D>(a: A, b: B, dest: D) -> Result<()>
where
    A: AsRef<Path>,
    B: AsRef<Path>,
    D: AsRef<Path>,
{
    let mut first = open_source(a.as_ref())?;
    let mut second = open_source(b.as_ref())?;

    let link_a = read_global_header(first.as_mut(), PCAP_GLOBAL_HEADER_LEN)
        .ok_or_else(|| Error::invalid_pcap("first input shorter than the global header"))
        .and_then(|h| parse_header_link_type(&h))?;
    let link_b = read_global_header(second.as_mut(), PCAP_GLOBAL_HEADER_LEN)
        .ok_or_else(|| Error::invalid_pcap("second input shorter than the global header"))
        .and_then(|h| parse_header_link_type(&h))?;

    if link_a != link_b {
        warn!(first = %link_a, second = %link_b, "concatenating pcap files with different link types");
    }

    let mut out = BufWriter::new(File::create(dest.as_ref())?);
    first.seek(SeekFrom::Start(0))?;
    let copied_a = io::copy(&mut first, &mut out)?;
    // `second` is positioned just past its global header.
    let copied_b = io::copy(&mut second, &mut out)?;
    out.flush()?;

    debug!(copied_a, copied_b, dest = %dest.as_ref().display(), "pcap files concatenated");
    Ok(())
}
