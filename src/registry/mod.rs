//! Access point / station registry.
//!
//! [`ApRegistry::on_frame`] is the only mutating entry point. Each frame is
//! decoded while the dissection gate is held, its decode handle is released,
//! the gate is dropped, and only then is the table updated. Readers receive
//! `Arc<AccessPoint>` snapshots: updates clone-on-write under the table lock,
//! so a snapshot never observes a half-applied frame.

mod access_point;
mod classify;
pub mod handshake;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::dissect::{DissectionClient, DissectionGate};
use crate::error::Result;
use crate::format::canonical_mac;
use crate::frame::FrameRecord;
use crate::pcap::PcapWriter;

pub use access_point::{AccessPoint, Encryption, Station};
pub use handshake::{Handshake, HandshakeAssembler, HandshakeMessage, Rejection, Transition};

use classify::{BeaconFacts, FrameFacts};

/// What [`ApRegistry::on_frame`] did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame updated the table.
    Updated {
        /// A beacon was counted; `true` when it created the access point.
        beacon: Option<bool>,
        /// A station's data-frame counter was bumped.
        station: bool,
    },
    /// An EAPOL frame reached the handshake assembler.
    Handshake(Transition),
    /// Valid frame with nothing to record.
    Ignored(&'static str),
    /// Decoding failed or the gate could not be acquired.
    Skipped,
}

/// Registry counters snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub frames: u64,
    pub skipped: u64,
    pub beacons: u64,
    pub station_frames: u64,
    pub eapol_frames: u64,
    pub handshake_messages: u64,
}

impl RegistryStats {
    /// Share of frames that could not be decoded (0.0 to 1.0).
    pub fn skip_ratio(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.skipped as f64 / self.frames as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    skipped: AtomicU64,
    beacons: AtomicU64,
    station_frames: AtomicU64,
    eapol_frames: AtomicU64,
    handshake_messages: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Table of access points keyed by canonical BSSID.
pub struct ApRegistry<C> {
    gate: Arc<DissectionGate<C>>,
    access_points: RwLock<HashMap<String, Arc<AccessPoint>>>,
    assembler: HandshakeAssembler,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl<C: DissectionClient> ApRegistry<C> {
    /// Registry using wall-clock time.
    pub fn new(gate: Arc<DissectionGate<C>>, config: &PipelineConfig) -> Self {
        Self::with_clock(gate, config, Arc::new(SystemClock))
    }

    /// Registry with an explicit time source.
    pub fn with_clock(gate: Arc<DissectionGate<C>>, config: &PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            gate,
            access_points: RwLock::new(HashMap::new()),
            assembler: HandshakeAssembler::new(config.handshake_window_ms),
            clock,
            counters: Counters::default(),
        }
    }

    /// The gate this registry decodes through.
    pub fn gate(&self) -> &Arc<DissectionGate<C>> {
        &self.gate
    }

    /// Process one frame.
    ///
    /// Never fails: decode errors and gate timeouts are logged and the frame
    /// is skipped. The frame's decode handle is always released.
    pub fn on_frame(&self, mut frame: FrameRecord) -> FrameOutcome {
        bump(&self.counters.frames);

        let facts = match self.gate.acquire() {
            Ok(mut gate) => {
                let facts = classify::extract(&mut frame, &mut gate);
                frame.cleanup(&mut gate);
                facts
            }
            Err(e) => Err(e),
        };

        let facts = match facts {
            Ok(facts) => facts,
            Err(e) => {
                bump(&self.counters.skipped);
                warn!(seq = frame.seq(), error = %e, "skipping frame");
                return FrameOutcome::Skipped;
            }
        };

        match facts {
            FrameFacts::Eapol {
                bssid,
                station,
                message,
            } => {
                bump(&self.counters.eapol_frames);
                self.apply_handshake(&bssid, &station, message, &frame)
            }
            FrameFacts::Wireless {
                bssid: Some(bssid),
                signal_dbm,
                beacon,
                station,
            } => self.apply_wireless(&bssid, signal_dbm, beacon, station, &frame),
            FrameFacts::Wireless { bssid: None, .. } => FrameOutcome::Ignored("frame without BSSID"),
            FrameFacts::Ignored(reason) => {
                debug!(seq = frame.seq(), reason, "frame ignored");
                FrameOutcome::Ignored(reason)
            }
        }
    }

    fn apply_wireless(
        &self,
        bssid: &str,
        signal_dbm: Option<i32>,
        beacon: Option<BeaconFacts>,
        station: Option<String>,
        frame: &FrameRecord,
    ) -> FrameOutcome {
        let now = self.clock.now_ms();
        let mut table = self.access_points.write();

        let mut created = None;
        if let Some(facts) = beacon {
            let is_new = !table.contains_key(bssid);
            let entry = table.entry(bssid.to_string()).or_insert_with(|| {
                Arc::new(AccessPoint::new(bssid, Some(Arc::new(frame.detached()))))
            });
            let ap = Arc::make_mut(entry);
            ap.ssid = facts.ssid;
            if facts.channel.is_some() {
                ap.channel = facts.channel;
            }
            ap.encryption = facts.encryption;
            ap.beacons += 1;
            ap.last_seen_ms = now;
            if signal_dbm.is_some() {
                ap.signal_dbm = signal_dbm;
            }

            bump(&self.counters.beacons);
            if is_new {
                info!(%bssid, ssid = %ap.ssid, encryption = %ap.encryption, "new access point");
            }
            created = Some(is_new);
        }

        let mut station_seen = false;
        if let (Some(mac), Some(entry)) = (station, table.get_mut(bssid)) {
            let ap = Arc::make_mut(entry);
            if signal_dbm.is_some() {
                ap.signal_dbm = signal_dbm;
            }
            let station = ap
                .stations
                .entry(mac.clone())
                .or_insert_with(|| Station::new(mac));
            station.data_frames += 1;
            station.last_seen_ms = now;

            bump(&self.counters.station_frames);
            station_seen = true;
        }

        if created.is_none() && !station_seen {
            return FrameOutcome::Ignored("no beacon or station for a known access point");
        }
        FrameOutcome::Updated {
            beacon: created,
            station: station_seen,
        }
    }

    fn apply_handshake(
        &self,
        bssid: &str,
        station: &str,
        message: HandshakeMessage,
        frame: &FrameRecord,
    ) -> FrameOutcome {
        let now = self.clock.now_ms();
        let mut table = self.access_points.write();

        let Some(entry) = table.get_mut(bssid) else {
            debug!(%bssid, %station, %message, "handshake frame for unknown access point");
            return FrameOutcome::Ignored("handshake frame for unknown access point");
        };

        let ap = Arc::make_mut(entry);
        let handshake = ap
            .handshakes
            .entry(station.to_string())
            .or_insert_with(|| Handshake::new(station, now));
        let was_complete = handshake.is_complete();

        let transition = self
            .assembler
            .apply(handshake, message, Arc::new(frame.detached()), now);

        match transition {
            Transition::Accepted => {
                bump(&self.counters.handshake_messages);
                if !was_complete && handshake.is_complete() {
                    info!(%bssid, %station, "handshake complete");
                } else {
                    debug!(%bssid, %station, %message, "handshake message stored");
                }
            }
            Transition::Rejected(reason) => {
                debug!(%bssid, %station, %message, %reason, "handshake message rejected");
            }
        }
        FrameOutcome::Handshake(transition)
    }

    /// Snapshot of one access point. `bssid` may be in any MAC notation.
    pub fn get_access_point(&self, bssid: &str) -> Option<Arc<AccessPoint>> {
        let key = canonical_mac(bssid)?;
        self.access_points.read().get(&key).cloned()
    }

    /// Snapshot of every access point, ordered by BSSID.
    pub fn all_access_points(&self) -> BTreeMap<String, Arc<AccessPoint>> {
        self.access_points
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }

    /// The creating beacon of every access point, ordered by BSSID.
    pub fn all_beacons(&self) -> Vec<Arc<FrameRecord>> {
        self.all_access_points()
            .values()
            .filter_map(|ap| ap.beacon.clone())
            .collect()
    }

    /// Frames of every complete handshake, each in message order 1 to 4.
    ///
    /// Ordered by BSSID, then station.
    pub fn all_complete_handshake_frames(&self) -> Vec<Arc<FrameRecord>> {
        self.all_access_points()
            .values()
            .flat_map(|ap| {
                ap.complete_handshakes()
                    .flat_map(|hs| hs.frames().cloned())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Write every complete handshake's frames to a new pcap file.
    ///
    /// Returns the number of frames written; with none, the file is left empty.
    pub fn write_handshakes<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let frames = self.all_complete_handshake_frames();
        let mut writer = PcapWriter::create(path.as_ref())?;
        for frame in &frames {
            writer.write_frame(frame.header(), frame.payload(), frame.link_type())?;
        }
        let written = writer.records_written();
        writer.finish()?;
        info!(path = %path.as_ref().display(), frames = written, "handshakes written");
        Ok(written)
    }

    /// Number of known access points.
    pub fn len(&self) -> usize {
        self.access_points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_points.read().is_empty()
    }

    /// Forget every access point.
    pub fn clear(&self) {
        let removed = {
            let mut table = self.access_points.write();
            let n = table.len();
            table.clear();
            n
        };
        debug!(removed, "registry cleared");
    }

    pub fn stats(&self) -> RegistryStats {
        let c = &self.counters;
        RegistryStats {
            frames: c.frames.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            beacons: c.beacons.load(Ordering::Relaxed),
            station_frames: c.station_frames.load(Ordering::Relaxed),
            eapol_frames: c.eapol_frames.load(Ordering::Relaxed),
            handshake_messages: c.handshake_messages.load(Ordering::Relaxed),
        }
    }
}
