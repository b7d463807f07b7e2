//! Link-layer framing of captured bytes.

use std::fmt;

use serde::Serialize;

/// Link types understood by the pipeline.
///
/// Each variant carries two numberings: the pcap `LINKTYPE_*` value stored in
/// container headers and the encapsulation id the dissection service expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Plain 802.11 frames
    Ieee80211,
    /// 802.11 frames behind a radiotap header
    Ieee80211Radiotap,
    /// Ethernet II
    Ethernet,
}

impl LinkType {
    /// All supported link types.
    pub const ALL: [LinkType; 3] = [
        LinkType::Ieee80211,
        LinkType::Ieee80211Radiotap,
        LinkType::Ethernet,
    ];

    /// pcap header value.
    pub fn pcap(self) -> u32 {
        match self {
            LinkType::Ieee80211 => 105,
            LinkType::Ieee80211Radiotap => 127,
            LinkType::Ethernet => 1,
        }
    }

    /// Encapsulation id used by the dissection service.
    pub fn encapsulation(self) -> u32 {
        match self {
            LinkType::Ieee80211 => 20,
            LinkType::Ieee80211Radiotap => 23,
            LinkType::Ethernet => 1,
        }
    }

    /// Look up a link type by its pcap header value.
    pub fn from_pcap(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.pcap() == value)
    }

    /// Look up a link type by its dissector encapsulation id.
    pub fn from_encapsulation(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.encapsulation() == value)
    }

    /// Whether payloads start with a radiotap preamble.
    pub fn has_radiotap(self) -> bool {
        matches!(self, LinkType::Ieee80211Radiotap)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkType::Ieee80211 => "IEEE 802.11",
            LinkType::Ieee80211Radiotap => "IEEE 802.11 + radiotap",
            LinkType::Ethernet => "Ethernet",
        };
        write!(f, "{name} ({})", self.pcap())
    }
}
