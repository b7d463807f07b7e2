//! Access point and station records held by the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::handshake::Handshake;
use crate::frame::FrameRecord;

/// Security advertised in a beacon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encryption {
    pub wpa: bool,
    pub wps: bool,
    pub wpa2: bool,
    pub wep: bool,
}

impl Encryption {
    /// Derive from beacon fields.
    ///
    /// `oui_types` and `tag_numbers` are the comma-separated lists reported by
    /// the dissector. Vendor OUI type 1 means WPA, 4 means WPS; tag 48 (RSN)
    /// means WPA2. Without any WPA variant the privacy bit decides between WEP
    /// and open.
    pub fn from_beacon_fields(oui_types: &str, tag_numbers: &str, privacy: &str) -> Self {
        let mut enc = Encryption::default();
        for oui in split_list(oui_types) {
            match oui {
                "1" => enc.wpa = true,
                "4" => enc.wps = true,
                _ => {}
            }
        }
        enc.wpa2 = split_list(tag_numbers).any(|tag| tag == "48");
        if !enc.wpa && !enc.wpa2 {
            enc.wep = privacy.trim() == "1";
        }
        enc
    }

    /// No WPA variant and no WEP.
    pub fn is_open(&self) -> bool {
        !self.wpa && !self.wpa2 && !self.wep
    }

    /// Space separated label, e.g. `WPA WPS WPA2`, `WEP` or `OPEN`.
    pub fn label(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.wpa {
            parts.push("WPA");
        }
        if self.wps {
            parts.push("WPS");
        }
        if self.wpa2 {
            parts.push("WPA2");
        }
        if self.wep {
            parts.push("WEP");
        } else if !self.wpa && !self.wpa2 {
            parts.push("OPEN");
        }
        parts.join(" ")
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Encryption {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// A client seen exchanging data frames with an access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub mac: String,
    pub data_frames: u64,
    pub last_seen_ms: u64,
}

impl Station {
    pub(crate) fn new(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            data_frames: 0,
            last_seen_ms: 0,
        }
    }
}

/// An access point, keyed by canonical BSSID.
///
/// Handed out as an immutable `Arc` snapshot; the registry replaces the whole
/// value on every update.
#[derive(Debug, Clone, Serialize)]
pub struct AccessPoint {
    pub bssid: String,
    pub ssid: String,
    pub channel: Option<u16>,
    pub encryption: Encryption,
    /// Beacons seen.
    pub beacons: u64,
    pub last_seen_ms: u64,
    /// Signal of the most recent frame that reported one (dBm).
    pub signal_dbm: Option<i32>,
    pub stations: BTreeMap<String, Station>,
    pub handshakes: BTreeMap<String, Handshake>,
    /// The beacon that created this entry.
    #[serde(skip)]
    pub beacon: Option<Arc<FrameRecord>>,
}

impl AccessPoint {
    pub(crate) fn new(bssid: impl Into<String>, beacon: Option<Arc<FrameRecord>>) -> Self {
        Self {
            bssid: bssid.into(),
            ssid: String::new(),
            channel: None,
            encryption: Encryption::default(),
            beacons: 0,
            last_seen_ms: 0,
            signal_dbm: None,
            stations: BTreeMap::new(),
            handshakes: BTreeMap::new(),
            beacon,
        }
    }

    pub fn station(&self, mac: &str) -> Option<&Station> {
        self.stations.get(mac)
    }

    pub fn handshake(&self, station: &str) -> Option<&Handshake> {
        self.handshakes.get(station)
    }

    /// Handshakes with message 2 captured.
    pub fn complete_handshakes(&self) -> impl Iterator<Item = &Handshake> {
        self.handshakes.values().filter(|hs| hs.is_complete())
    }
}
