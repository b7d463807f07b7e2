//! Pipeline tuning knobs.

use std::time::Duration;

use crate::dissect::DEFAULT_GATE_TIMEOUT;
use crate::pcap::LinkType;

/// Window within which message 2 must follow message 1 (milliseconds).
pub const DEFAULT_HANDSHAKE_WINDOW_MS: u64 = 3000;

/// Records read per container chunk during scans.
pub const DEFAULT_SCAN_CHUNK: usize = 500;

/// Frames buffered between a live feed and its consumer.
pub const DEFAULT_LIVE_QUEUE: usize = 1024;

/// Settings shared by the registry, scanners and live feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum gap between handshake messages 1 and 2.
    pub handshake_window_ms: u64,
    /// How long to wait for the dissection gate; `None` waits forever.
    pub gate_timeout: Option<Duration>,
    /// Records per read when scanning containers.
    pub scan_chunk: usize,
    /// Link type stamped on live frames.
    pub capture_mode: LinkType,
    /// Bound of the live frame queue.
    pub live_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            handshake_window_ms: DEFAULT_HANDSHAKE_WINDOW_MS,
            gate_timeout: Some(DEFAULT_GATE_TIMEOUT),
            scan_chunk: DEFAULT_SCAN_CHUNK,
            capture_mode: LinkType::Ieee80211Radiotap,
            live_queue_capacity: DEFAULT_LIVE_QUEUE,
        }
    }
}

impl PipelineConfig {
    pub fn with_capture_mode(mut self, link_type: LinkType) -> Self {
        self.capture_mode = link_type;
        self
    }

    pub fn with_scan_chunk(mut self, records: usize) -> Self {
        self.scan_chunk = records.max(1);
        self
    }

    pub fn with_gate_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.gate_timeout = timeout;
        self
    }

    pub fn with_handshake_window_ms(mut self, ms: u64) -> Self {
        self.handshake_window_ms = ms;
        self
    }
}
