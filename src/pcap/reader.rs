//! pcap container reader with an offset index for random access.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::debug;

use super::index::{IndexedSource, LengthField, RecordLayout, SeekRead};
use super::ivs::IVS_MAGIC;
use super::{CaptureRecord, ContainerIndex, LinkType, PCAP_RECORD_HEADER_LEN};
use crate::error::{CaptureError, Error, Result};
use crate::format::ByteView;

/// Buffer size for reading container files (64KB).
const BUFFER_SIZE: usize = 65536;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// pcap magic number, read as u32 little-endian.
pub const PCAP_MAGIC: u32 = 0xA1B2_C3D4;

/// Size of the pcap global header.
pub const PCAP_GLOBAL_HEADER_LEN: usize = 24;

/// Offset of the link type inside the global header.
const LINK_TYPE_OFFSET: usize = 20;

pub(crate) const PCAP_LAYOUT: RecordLayout = RecordLayout {
    kind: "pcap",
    data_offset: PCAP_GLOBAL_HEADER_LEN as u64,
    header_len: PCAP_RECORD_HEADER_LEN,
    length: LengthField::U32 { at: 8 },
};

/// An open, indexed pcap container.
///
/// The index is built when the container is opened. Call
/// [`build_index`](Self::build_index) again to pick up records appended since.
///
/// # Example
///
/// ```no_run
/// use wlanscope::pcap::PcapContainer;
///
/// let mut container = PcapContainer::open("capture.pcap")?;
/// for record in container.read_records(1, 0)? {
///     println!("#{} at {} ({} bytes)", record.seq, record.offset, record.payload.len());
/// }
/// # Ok::<(), wlanscope::Error>(())
/// ```
pub struct PcapContainer {
    source: IndexedSource,
    link_type: LinkType,
    snaplen: u32,
}

impl PcapContainer {
    /// Open a pcap file, validating its header and indexing its records.
    ///
    /// Gzipped files (by extension or magic bytes) are inflated into memory first.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_source(path)?;
        debug!(path = %path.display(), "opening pcap container");
        Self::from_source(reader)
    }

    /// Open a pcap container from any seekable reader.
    pub fn from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Result<Self> {
        Self::from_source(Box::new(reader))
    }

    fn from_source(mut reader: Box<dyn SeekRead>) -> Result<Self> {
        let header = read_global_header(reader.as_mut(), PCAP_GLOBAL_HEADER_LEN)
            .ok_or_else(|| Error::invalid_pcap("file shorter than the 24-byte global header"))?;
        let view = ByteView::new(&header);

        let magic = view.u32_le(0).unwrap_or_default();
        if magic != PCAP_MAGIC {
            return Err(Error::invalid_pcap(format!(
                "unknown magic number: {:02x?}",
                &header[..4]
            )));
        }

        let raw_link_type = view.u32_le(LINK_TYPE_OFFSET).unwrap_or_default();
        let link_type = LinkType::from_pcap(raw_link_type).ok_or(Error::Capture(
            CaptureError::UnsupportedLinkType {
                link_type: raw_link_type,
            },
        ))?;
        let snaplen = view.u32_le(16).unwrap_or_default();

        let mut container = Self {
            source: IndexedSource::new(reader, PCAP_LAYOUT),
            link_type,
            snaplen,
        };
        container.build_index()?;
        Ok(container)
    }

    /// Link type declared in the global header.
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Snapshot length declared in the global header.
    pub fn snaplen(&self) -> u32 {
        self.snaplen
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

    /// Read `count` records starting at `start_seq` (1-indexed).
    ///
    /// `count == 0` reads everything from `start_seq` to the end. Fewer records
    /// than requested are returned when the container ends first.
    pub fn read_records(&mut self, start_seq: u64, count: usize) -> Result<Vec<CaptureRecord>> {
        self.source.read_records(start_seq, count)
    }

    /// Read a single record.
    pub fn read_record(&mut self, seq: u64) -> Result<CaptureRecord> {
        let available = self.len() as u64;
        self.read_records(seq, 1)?
            .pop()
            .ok_or(Error::Capture(CaptureError::OutOfRange { seq, available }))
    }
}

/// Open a container file for indexed reading.
///
/// Plain files are wrapped in a `BufReader`; gzipped files are inflated into
/// memory since the index needs to seek.
pub(crate) fn open_source(path: &Path) -> Result<Box<dyn SeekRead>> {
    let gzipped = is_gzip_file(path)?;
    let file = File::open(path)?;

    if gzipped {
        let mut data = Vec::new();
        GzDecoder::new(file).read_to_end(&mut data)?;
        debug!(path = %path.display(), inflated = data.len(), "inflated gzip container");
        Ok(Box::new(Cursor::new(data)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Read exactly `len` header bytes from the start, or `None` if the source is shorter.
pub(crate) fn read_global_header(reader: &mut dyn SeekRead, len: usize) -> Option<Vec<u8>> {
    reader.seek(SeekFrom::Start(0)).ok()?;
    let mut header = vec![0u8; len];
    reader.read_exact(&mut header).ok()?;
    Some(header)
}

/// Check if a file is gzipped by extension or magic bytes.
pub(crate) fn is_gzip_file(path: &Path) -> Result<bool> {
    if is_gzip_extension(path) {
        return Ok(true);
    }

    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(_) => Ok(false), // File too short to be gzipped
    }
}

/// Check if a path appears to be a gzip file by extension only.
pub fn is_gzip_extension<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|f| f.to_str())
        .map_or(false, |name| name.to_lowercase().ends_with(".gz"))
}

/// Which container format a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Pcap,
    Ivs,
}

impl ContainerKind {
    /// Detect the format from the leading magic bytes (after inflating gzip).
    ///
    /// Falls back to the `.ivs` / `.ivs.gz` extension, then to pcap, so that
    /// opening the wrong kind still produces a format error naming the problem.
    ///
    /// Only the first bytes are read; a gzip file is inflated just far enough
    /// to reach them.
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(magic) = sniff_magic(path)? {
            if magic == IVS_MAGIC {
                return Ok(Self::Ivs);
            }
            if ByteView::new(&magic).u32_le(0) == Some(PCAP_MAGIC) {
                return Ok(Self::Pcap);
            }
        }

        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if name.ends_with(".ivs") || name.ends_with(".ivs.gz") {
            Ok(Self::Ivs)
        } else {
            Ok(Self::Pcap)
        }
    }
}

/// Leading magic bytes, or `None` if the (inflated) file is too short to hold them.
fn sniff_magic(path: &Path) -> Result<Option<[u8; 4]>> {
    let gzipped = is_gzip_file(path)?;
    let file = File::open(path)?;
    let mut magic = [0u8; 4];
    let read = if gzipped {
        GzDecoder::new(file).read_exact(&mut magic)
    } else {
        BufReader::new(file).read_exact(&mut magic)
    };
    match read {
        Ok(()) => Ok(Some(magic)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no container magic");
            Ok(None)
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcap => write!(f, "pcap"),
            Self::Ivs => write!(f, "ivs"),
        }
    }
}
