//! Frame I/O.
//!
//! Frames reach the registry through one of two doors:
//!
//! - `ContainerFrames` - stored pcap containers, read through their index in chunks
//! - `LiveFeed` / `Subscription` - frames pushed by an external capture transport
//!
//! The scan drivers ([`scan_container`], [`scan_beacons`]) sit on the offline side.

mod live;
mod source;

pub use live::{FrameQueue, LiveFeed, Subscription};
pub use source::{scan_beacons, scan_container, ContainerFrames, FrameReader, ScanSummary};
