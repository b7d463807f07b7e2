//! ivs compact container: a 6-byte file header followed by short records.
//!
//! Record header is 4 bytes: flags in byte 0, a reserved byte, then a u16 LE
//! payload length at offset 2. Records whose flags have both `0x03` bits set
//! carry a 6-byte BSSID followed by the SSID.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use super::index::{IndexedSource, LengthField, RecordLayout, SeekRead};
use super::reader::{open_source, read_global_header};
use super::{CaptureRecord, ContainerIndex};
use crate::error::{Error, Result};
use crate::format::{format_mac, ByteView};

/// ivs magic bytes.
pub const IVS_MAGIC: [u8; 4] = [0xAE, 0x78, 0xD1, 0xFF];

/// Size of the ivs file header (magic plus two reserved bytes).
pub const IVS_HEADER_LEN: usize = 6;

/// Size of an ivs record header.
pub const IVS_RECORD_HEADER_LEN: usize = 4;

/// Flag bits marking a BSSID + SSID record.
const BSSID_SSID_FLAGS: u8 = 0x03;

const BSSID_LEN: usize = 6;

pub(crate) const IVS_LAYOUT: RecordLayout = RecordLayout {
    kind: "ivs",
    data_offset: IVS_HEADER_LEN as u64,
    header_len: IVS_RECORD_HEADER_LEN,
    length: LengthField::U16 { at: 2 },
};

/// An open, indexed ivs container.
pub struct IvsContainer {
    source: IndexedSource,
}

impl IvsContainer {
    /// Open an ivs file, validating its magic and indexing its records.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening ivs container");
        Self::from_source(open_source(path)?)
    }

    /// Open an ivs container from any seekable reader.
    pub fn from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Result<Self> {
        Self::from_source(Box::new(reader))
    }

    fn from_source(mut reader: Box<dyn SeekRead>) -> Result<Self> {
        check_header(reader.as_mut())?;
        let mut container = Self {
            source: IndexedSource::new(reader, IVS_LAYOUT),
        };
        container.build_index()?;
        Ok(container)
    }

    /// Number of complete records.
    pub fn len(&self) -> usize {
        self.source.index().len()
    }

    /// Whether the container holds no complete record.
    pub fn is_empty(&self) -> bool {
        self.source.index().is_empty()
    }

    /// The current record index.
    pub fn index(&self) -> &ContainerIndex {
        self.source.index()
    }

    /// Rescan the container and return the number of complete records.
    pub fn build_index(&mut self) -> Result<usize> {
        Ok(self.source.build_index()?.len())
    }

    /// Read `count` records starting at `start_seq`; `count == 0` reads all remaining.
    pub fn read_records(&mut self, start_seq: u64, count: usize) -> Result<Vec<CaptureRecord>> {
        self.source.read_records(start_seq, count)
    }

    /// BSSID to SSID map built from every BSSID + SSID record.
    ///
    /// Later records for the same BSSID win.
    pub fn access_points(&mut self) -> Result<BTreeMap<String, String>> {
        let mut aps = BTreeMap::new();
        for record in self.read_records(1, 0)? {
            if let Some((bssid, ssid)) = bssid_ssid(&record) {
                trace!(seq = record.seq, %bssid, %ssid, "ivs access point record");
                aps.insert(bssid, ssid);
            }
        }
        Ok(aps)
    }
}

/// Extract the BSSID and SSID carried by a flagged ivs record.
pub fn bssid_ssid(record: &CaptureRecord) -> Option<(String, String)> {
    let header = ByteView::new(&record.header);
    if header.u8_at(0)? & BSSID_SSID_FLAGS != BSSID_SSID_FLAGS {
        return None;
    }

    let payload = ByteView::new(&record.payload);
    let bssid = format_mac(payload.slice(0, BSSID_LEN)?)?;
    let ssid_len = usize::from(header.u16_le(2)?).checked_sub(BSSID_LEN)?;
    let ssid = payload.slice(BSSID_LEN, ssid_len)?;
    Some((bssid, String::from_utf8_lossy(ssid).into_owned()))
}

fn check_header(reader: &mut dyn SeekRead) -> Result<()> {
    let header = read_global_header(reader, IVS_HEADER_LEN)
        .ok_or_else(|| Error::invalid_ivs("file shorter than the 6-byte header"))?;
    if header[..4] != IVS_MAGIC {
        return Err(Error::invalid_ivs(format!(
            "unknown magic number: {:02x?}",
            &header[..4]
        )));
    }
    Ok(())
}

/// Merge two ivs files into `dest`: `a` verbatim, then `b` without its header.
pub fn concat<A, B, D>(a: A, b: B, dest: D) -> Result<()>
where
    A: AsRef<Path>,
    B: AsRef<Path>,
    D: AsRef<Path>,
{
    let mut first = open_source(a.as_ref())?;
    let mut second = open_source(b.as_ref())?;
    check_header(first.as_mut())?;
    check_header(second.as_mut())?;

    let mut out = BufWriter::new(File::create(dest.as_ref())?);
    first.seek(SeekFrom::Start(0))?;
    io::copy(&mut first, &mut out)?;
    second.seek(SeekFrom::Start(IVS_HEADER_LEN as u64))?;
    io::copy(&mut second, &mut out)?;
    out.flush()?;

    debug!(dest = %dest.as_ref().display(), "ivs files merged");
    Ok(())
}
