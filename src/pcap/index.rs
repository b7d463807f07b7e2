//! Sequence-number to byte-offset index shared by both container formats.

use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;
use tracing::{debug, warn};

use super::CaptureRecord;
use crate::error::{CaptureError, Error, Result};
use crate::format::ByteView;

/// Record offsets of one open container, in file order.
///
/// Offsets are strictly increasing; entry `n - 1` holds record `n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerIndex {
    offsets: Vec<u64>,
    truncated: bool,
}

impl ContainerIndex {
    /// Number of complete records.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the container holds no complete record.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Byte offset of record `seq` (1-indexed).
    pub fn offset(&self, seq: u64) -> Option<u64> {
        let idx = usize::try_from(seq.checked_sub(1)?).ok()?;
        self.offsets.get(idx).copied()
    }

    /// Whether record `seq` is indexed.
    pub fn contains(&self, seq: u64) -> bool {
        self.offset(seq).is_some()
    }

    /// All offsets in sequence order.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Whether trailing bytes were left over after the last complete record.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Width of the per-record length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthField {
    U16 { at: usize },
    U32 { at: usize },
}

/// Fixed record framing of a container format.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordLayout {
    pub kind: &'static str,
    /// Size of the global header; the first record starts here.
    pub data_offset: u64,
    /// Size of every record header.
    pub header_len: usize,
    pub length: LengthField,
}

impl RecordLayout {
    fn payload_len(&self, header: &[u8]) -> Option<u64> {
        let view = ByteView::new(header);
        match self.length {
            LengthField::U16 { at } => view.u16_le(at).map(u64::from),
            LengthField::U32 { at } => view.u32_le(at).map(u64::from),
        }
    }
}

/// Anything the containers can be read from.
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

/// Container byte source plus its record index.
///
/// Index scans and random-access reads both move the reader's cursor, so one
/// source must not be shared between threads without external locking.
pub(crate) struct IndexedSource {
    reader: Box<dyn SeekRead>,
    layout: RecordLayout,
    index: ContainerIndex,
}

impl IndexedSource {
    pub(crate) fn new(reader: Box<dyn SeekRead>, layout: RecordLayout) -> Self {
        Self {
            reader,
            layout,
            index: ContainerIndex::default(),
        }
    }

    pub(crate) fn index(&self) -> &ContainerIndex {
        &self.index
    }

    /// Rebuild the index with one forward pass over the records.
    ///
    /// Stops at the first record whose header or payload does not fit in the
    /// remaining bytes; that partial tail is excluded without error.
    pub(crate) fn build_index(&mut self) -> Result<&ContainerIndex> {
        let total = self.reader.seek(SeekFrom::End(0))?;
        let header_len = self.layout.header_len as u64;
        let mut offset = self.layout.data_offset;
        let mut index = ContainerIndex::default();
        let mut header = vec![0u8; self.layout.header_len];

        self.reader.seek(SeekFrom::Start(offset.min(total)))?;

        loop {
            let remaining = total.saturating_sub(offset);
            if remaining < header_len {
                index.truncated = remaining > 0;
                break;
            }

            self.reader.read_exact(&mut header)?;
            let Some(payload_len) = self.layout.payload_len(&header) else {
                index.truncated = true;
                break;
            };

            let end = offset + header_len + payload_len;
            if end > total {
                index.truncated = true;
                break;
            }

            let skipped = io::copy(&mut self.reader.by_ref().take(payload_len), &mut io::sink())?;
            if skipped != payload_len {
                index.truncated = true;
                break;
            }

            index.offsets.push(offset);
            offset = end;
        }

        if index.truncated {
            warn!(
                kind = self.layout.kind,
                records = index.len(),
                "container ends with a partial record; indexed up to the last complete one"
            );
        } else {
            debug!(kind = self.layout.kind, records = index.len(), "container indexed");
        }

        self.index = index;
        Ok(&self.index)
    }

    /// Read `count` records starting at `start_seq`; `count == 0` reads all remaining.
    pub(crate) fn read_records(&mut self, start_seq: u64, count: usize) -> Result<Vec<CaptureRecord>> {
        let available = self.index.len() as u64;

        // "All remaining" from just past the end is simply nothing.
        if count == 0 && start_seq == available + 1 {
            return Ok(Vec::new());
        }

        let first_offset = self.index.offset(start_seq).ok_or(Error::Capture(
            CaptureError::OutOfRange {
                seq: start_seq,
                available,
            },
        ))?;

        let last_seq = if count == 0 {
            available
        } else {
            available.min(start_seq.saturating_add(count as u64 - 1))
        };

        self.reader.seek(SeekFrom::Start(first_offset))?;

        let mut records = Vec::with_capacity((last_seq - start_seq + 1) as usize);
        for seq in start_seq..=last_seq {
            let offset = self.index.offset(seq).unwrap_or(first_offset);

            let mut header = vec![0u8; self.layout.header_len];
            self.reader.read_exact(&mut header)?;

            let payload_len = self
                .layout
                .payload_len(&header)
                .ok_or_else(|| Error::Capture(CaptureError::InvalidFormat {
                    kind: self.layout.kind,
                    reason: format!("unreadable record header at offset {offset}"),
                }))?;

            let mut payload = vec![0u8; payload_len as usize];
            self.reader.read_exact(&mut payload)?;

            records.push(CaptureRecord::new(
                seq,
                offset,
                Bytes::from(header),
                Bytes::from(payload),
            ));
        }

        Ok(records)
    }
}
