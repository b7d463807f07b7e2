//! wlanscope - passive 802.11 capture analysis.
//!
//! This library reads stored capture containers (pcap and ivs), classifies
//! 802.11 frames into access points and their stations, and assembles WPA
//! 4-way handshakes from an unordered frame stream. Frame decoding is done by
//! an external dissector plugged in through [`dissect::DissectionClient`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wlanscope::config::PipelineConfig;
//! use wlanscope::dissect::{DecodeHandle, DissectionClient, DissectionGate, FieldKey};
//! use wlanscope::io::scan_container;
//! use wlanscope::pcap::{LinkType, PcapContainer};
//! use wlanscope::registry::ApRegistry;
//!
//! struct MyDissector;
//!
//! impl DissectionClient for MyDissector {
//!     fn dissect(&mut self, _header: &[u8], _payload: &[u8], _link: LinkType) -> Option<DecodeHandle> {
//!         None
//!     }
//!     fn field(&mut self, _handle: DecodeHandle, _key: FieldKey) -> Option<String> {
//!         None
//!     }
//!     fn cleanup(&mut self, _handle: DecodeHandle) {}
//! }
//!
//! fn main() -> wlanscope::Result<()> {
//!     let config = PipelineConfig::default();
//!     let gate = Arc::new(DissectionGate::with_timeout(MyDissector, config.gate_timeout));
//!     let registry = ApRegistry::new(gate, &config);
//!
//!     let mut container = PcapContainer::open("capture.pcap")?;
//!     scan_container(&registry, &mut container, config.scan_chunk)?;
//!
//!     for (bssid, ap) in registry.all_access_points() {
//!         println!("{bssid} {} {}", ap.ssid, ap.encryption);
//!     }
//!     registry.write_handshakes("handshakes.pcap")?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod dissect;
pub mod error;
pub mod format;
pub mod frame;
pub mod io;
pub mod pcap;
pub mod registry;

pub use error::{Error, Result};
