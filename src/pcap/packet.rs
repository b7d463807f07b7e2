//! Raw record representation.

use bytes::Bytes;

use crate::format::ByteView;

/// Size of a pcap record header.
pub const PCAP_RECORD_HEADER_LEN: usize = 16;

/// A record read from a capture container.
///
/// Immutable once read. `header` holds the container's own per-record header
/// (16 bytes for pcap, 4 bytes for ivs) exactly as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// Sequence number (1-indexed, contiguous).
    pub seq: u64,

    /// Byte offset of the record header in the container.
    pub offset: u64,

    /// Raw record header.
    pub header: Bytes,

    /// Raw record payload.
    pub payload: Bytes,
}

impl CaptureRecord {
    /// Create a new record.
    pub fn new(seq: u64, offset: u64, header: Bytes, payload: Bytes) -> Self {
        Self {
            seq,
            offset,
            header,
            payload,
        }
    }

    /// Total bytes the record occupies in its container.
    pub fn stored_len(&self) -> usize {
        self.header.len() + self.payload.len()
    }
}

/// Decoded pcap record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PcapRecordHeader {
    /// Timestamp seconds.
    pub ts_sec: u32,
    /// Timestamp microseconds.
    pub ts_usec: u32,
    /// Captured length (bytes stored after the header).
    pub captured_len: u32,
    /// Original length on the wire.
    pub original_len: u32,
}

impl PcapRecordHeader {
    /// Header for a payload of `len` bytes with zero-filled timestamps.
    pub fn for_payload(len: u32) -> Self {
        Self {
            ts_sec: 0,
            ts_usec: 0,
            captured_len: len,
            original_len: len,
        }
    }

    /// Parse a 16-byte little-endian record header.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let view = ByteView::new(data);
        Some(Self {
            ts_sec: view.u32_le(0)?,
            ts_usec: view.u32_le(4)?,
            captured_len: view.u32_le(8)?,
            original_len: view.u32_le(12)?,
        })
    }

    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> [u8; PCAP_RECORD_HEADER_LEN] {
        let mut out = [0u8; PCAP_RECORD_HEADER_LEN];
        out[0..4].copy_from_slice(&self.ts_sec.to_le_bytes());
        out[4..8].copy_from_slice(&self.ts_usec.to_le_bytes());
        out[8..12].copy_from_slice(&self.captured_len.to_le_bytes());
        out[12..16].copy_from_slice(&self.original_len.to_le_bytes());
        out
    }

    /// Timestamp in microseconds since the epoch.
    pub fn timestamp_us(&self) -> i64 {
        (self.ts_sec as i64) * 1_000_000 + (self.ts_usec as i64)
    }

    /// Check if the packet was truncated during capture.
    pub fn is_truncated(&self) -> bool {
        self.captured_len < self.original_len
    }
}
