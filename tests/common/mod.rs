//! Shared helpers for integration tests.
//!
//! [`Script`] stands in for the external dissector: each payload registered
//! with it decodes to a fixed set of fields. It also counts decode handles so
//! tests can check that every handle handed out was released.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wlanscope::dissect::{DecodeHandle, DissectionClient, FieldKey, FieldNode};
use wlanscope::frame::FrameRecord;
use wlanscope::pcap::LinkType;

pub type Fields = Vec<(FieldKey, String)>;

#[derive(Default)]
struct ScriptState {
    frames: HashMap<Vec<u8>, Fields>,
    live: HashMap<u64, Vec<u8>>,
    next_handle: u64,
    next_payload: u64,
    decoded: u64,
}

/// Scripted field tables shared between a test and its dissector.
#[derive(Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dissector answering from this script.
    pub fn dissector(&self) -> ScriptedDissector {
        ScriptedDissector {
            script: self.clone(),
        }
    }

    /// Register `payload` to decode to `fields`.
    pub fn register(&self, payload: &[u8], fields: Fields) {
        self.state.lock().unwrap().frames.insert(payload.to_vec(), fields);
    }

    /// A fresh, unique payload decoding to `fields`.
    pub fn payload(&self, fields: Fields) -> Vec<u8> {
        let payload = {
            let mut state = self.state.lock().unwrap();
            state.next_payload += 1;
            format!("frame-{}", state.next_payload).into_bytes()
        };
        self.register(&payload, fields);
        payload
    }

    /// A frame whose payload decodes to `fields`.
    pub fn frame(&self, seq: u64, fields: Fields) -> FrameRecord {
        FrameRecord::new(seq, LinkType::Ieee80211Radiotap, Vec::new(), self.payload(fields))
    }

    /// Handles handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Total successful decodes.
    pub fn decoded(&self) -> u64 {
        self.state.lock().unwrap().decoded
    }
}

/// [`DissectionClient`] backed by a [`Script`].
pub struct ScriptedDissector {
    script: Script,
}

impl DissectionClient for ScriptedDissector {
    fn dissect(&mut self, _header: &[u8], payload: &[u8], _link_type: LinkType) -> Option<DecodeHandle> {
        let mut state = self.script.state.lock().unwrap();
        if !state.frames.contains_key(payload) {
            return None;
        }
        state.next_handle += 1;
        state.decoded += 1;
        let handle = state.next_handle;
        state.live.insert(handle, payload.to_vec());
        Some(DecodeHandle::new(handle))
    }

    fn field(&mut self, handle: DecodeHandle, key: FieldKey) -> Option<String> {
        let state = self.script.state.lock().unwrap();
        let payload = state.live.get(&handle.raw())?;
        state.frames[payload]
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    fn all_fields(&mut self, handle: DecodeHandle) -> Vec<FieldNode> {
        let state = self.script.state.lock().unwrap();
        let Some(payload) = state.live.get(&handle.raw()) else {
            return Vec::new();
        };
        state.frames[payload]
            .iter()
            .map(|(key, value)| FieldNode {
                key: key.name().to_string(),
                parent: key.name().split('.').next().map(str::to_string),
                description: key.name().to_string(),
                value: value.clone(),
            })
            .collect()
    }

    fn cleanup(&mut self, handle: DecodeHandle) {
        let mut state = self.script.state.lock().unwrap();
        assert!(state.live.remove(&handle.raw()).is_some(), "handle {} released twice", handle.raw());
    }
}

fn fields(pairs: &[(FieldKey, &str)]) -> Fields {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

/// Fields of a beacon advertising `ssid` on `channel`.
///
/// `tags` and `oui_types` are the comma-separated lists the dissector reports.
pub fn beacon_fields(bssid: &str, ssid: &str, channel: u16, tags: &str, oui_types: &str, privacy: bool) -> Fields {
    let channel = channel.to_string();
    fields(&[
        (FieldKey::FrameProtocols, "radiotap:wlan_radio:wlan"),
        (FieldKey::FcTypeSubtype, "0x08"),
        (FieldKey::Bssid, bssid),
        (FieldKey::SourceAddress, bssid),
        (FieldKey::DestinationAddress, "ff:ff:ff:ff:ff:ff"),
        (FieldKey::DsStatus, "0x00"),
        (FieldKey::SignalDbm, "-42"),
        (FieldKey::Ssid, ssid),
        (FieldKey::CurrentChannel, &channel),
        (FieldKey::TagNumber, tags),
        (FieldKey::TagOuiType, oui_types),
        (FieldKey::PrivacyBit, if privacy { "1" } else { "0" }),
    ])
}

/// Fields of a data frame between `bssid` and a station.
///
/// `ds` is the DS status value: `0x01` toDS, `0x02` fromDS.
pub fn data_fields(bssid: &str, source: &str, destination: &str, ds: &str) -> Fields {
    fields(&[
        (FieldKey::FrameProtocols, "radiotap:wlan_radio:wlan:data"),
        (FieldKey::FcTypeSubtype, "0x20"),
        (FieldKey::Bssid, bssid),
        (FieldKey::SourceAddress, source),
        (FieldKey::DestinationAddress, destination),
        (FieldKey::DsStatus, ds),
        (FieldKey::SignalDbm, "-60"),
    ])
}

/// Fields of EAPOL-Key handshake message `message` (1 to 4).
pub fn eapol_fields(bssid: &str, station: &str, message: u8) -> Fields {
    let (ack, mic, install, data_len) = match message {
        1 => ("1", "0", "0", "0"),
        2 => ("0", "1", "0", "22"),
        3 => ("1", "1", "1", "56"),
        _ => ("0", "1", "0", "0"),
    };
    let (source, destination) = if message == 1 || message == 3 {
        (bssid, station)
    } else {
        (station, bssid)
    };
    let ds = if message == 1 || message == 3 { "0x02" } else { "0x01" };
    fields(&[
        (FieldKey::FrameProtocols, "radiotap:wlan_radio:wlan:llc:eapol"),
        (FieldKey::FcTypeSubtype, "0x28"),
        (FieldKey::Bssid, bssid),
        (FieldKey::SourceAddress, source),
        (FieldKey::DestinationAddress, destination),
        (FieldKey::DsStatus, ds),
        (FieldKey::KeyAck, ack),
        (FieldKey::KeyMic, mic),
        (FieldKey::KeyInstall, install),
        (FieldKey::KeyDataLength, data_len),
    ])
}

/// Raw radiotap + 802.11 beacon bytes, readable by the raw beacon path.
pub fn raw_beacon(bssid: [u8; 6], ssid: &str) -> Vec<u8> {
    let mut frame = vec![0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00]; // radiotap, 8 bytes
    frame.extend_from_slice(&[0x80, 0x00, 0x00, 0x00]); // frame control + duration
    frame.extend_from_slice(&[0xff; 6]); // receiver
    frame.extend_from_slice(&bssid); // transmitter
    frame.extend_from_slice(&bssid); // BSSID
    frame.extend_from_slice(&[0x00, 0x00]); // sequence control
    frame.extend_from_slice(&[0u8; 8]); // timestamp
    frame.extend_from_slice(&[0x64, 0x00]); // beacon interval
    frame.extend_from_slice(&[0x11, 0x04]); // capabilities
    frame.push(0x00); // SSID tag
    frame.push(ssid.len() as u8);
    frame.extend_from_slice(ssid.as_bytes());
    frame
}
