//! Field extraction for one frame, run while the dissection gate is held.
//!
//! Everything the registry needs is copied out of the dissector into
//! [`FrameFacts`], so the gate can be released before the table is touched.

use tracing::trace;

use super::access_point::Encryption;
use super::handshake::HandshakeMessage;
use crate::dissect::{DissectionClient, FieldKey, GateGuard};
use crate::error::Result;
use crate::format::{canonical_mac, is_broadcast_address, BROADCAST_MAC};
use crate::frame::FrameRecord;

/// Management subtype of a beacon.
const BEACON_SUBTYPE: u16 = 0x08;

const TO_DS: u8 = 0x01;
const FROM_DS: u8 = 0x02;

/// What a beacon advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BeaconFacts {
    pub ssid: String,
    pub channel: Option<u16>,
    pub encryption: Encryption,
}

/// Registry-relevant content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FrameFacts {
    /// EAPOL-Key frame belonging to a 4-way handshake.
    Eapol {
        bssid: String,
        station: String,
        message: HandshakeMessage,
    },
    /// Any other 802.11 frame.
    Wireless {
        bssid: Option<String>,
        signal_dbm: Option<i32>,
        beacon: Option<BeaconFacts>,
        /// Unicast station of a frame going to or from the distribution system.
        station: Option<String>,
    },
    /// Nothing the registry tracks.
    Ignored(&'static str),
}

/// Read the fields of `frame` through the held gate.
pub(crate) fn extract<C: DissectionClient>(
    frame: &mut FrameRecord,
    gate: &mut GateGuard<'_, C>,
) -> Result<FrameFacts> {
    let protocols = frame.field(gate, FieldKey::FrameProtocols)?.unwrap_or_default();
    if protocols.split(':').any(|p| p == "eapol") {
        return eapol_facts(frame, gate);
    }
    wireless_facts(frame, gate)
}

fn eapol_facts<C: DissectionClient>(
    frame: &mut FrameRecord,
    gate: &mut GateGuard<'_, C>,
) -> Result<FrameFacts> {
    let ack = flag(frame.field(gate, FieldKey::KeyAck)?);
    let mic = flag(frame.field(gate, FieldKey::KeyMic)?);
    let install = flag(frame.field(gate, FieldKey::KeyInstall)?);
    let data_len = frame
        .field(gate, FieldKey::KeyDataLength)?
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let Some(message) = HandshakeMessage::from_key_info(ack, mic, install, data_len) else {
        return Ok(FrameFacts::Ignored("EAPOL frame is not a handshake message"));
    };

    let Some(bssid) = frame.field(gate, FieldKey::Bssid)?.as_deref().and_then(canonical_mac) else {
        return Ok(FrameFacts::Ignored("EAPOL frame without BSSID"));
    };

    // Messages 1 and 3 travel AP -> station.
    let station_key = if message.from_authenticator() {
        FieldKey::DestinationAddress
    } else {
        FieldKey::SourceAddress
    };
    let Some(station) = frame.field(gate, station_key)?.as_deref().and_then(canonical_mac) else {
        return Ok(FrameFacts::Ignored("EAPOL frame without station address"));
    };

    trace!(seq = frame.seq(), %bssid, %station, %message, "EAPOL handshake frame");
    Ok(FrameFacts::Eapol {
        bssid,
        station,
        message,
    })
}

fn wireless_facts<C: DissectionClient>(
    frame: &mut FrameRecord,
    gate: &mut GateGuard<'_, C>,
) -> Result<FrameFacts> {
    let subtype = frame
        .field(gate, FieldKey::FcTypeSubtype)?
        .as_deref()
        .and_then(parse_hex);
    let bssid = frame
        .field(gate, FieldKey::Bssid)?
        .as_deref()
        .and_then(canonical_mac);
    let signal_dbm = frame
        .field(gate, FieldKey::SignalDbm)?
        .and_then(|v| v.parse::<i32>().ok());
    let ds = frame
        .field(gate, FieldKey::DsStatus)?
        .as_deref()
        .and_then(parse_hex)
        .unwrap_or(0) as u8;

    let beacon = match &bssid {
        Some(b) if subtype == Some(BEACON_SUBTYPE) && b != BROADCAST_MAC => {
            Some(beacon_facts(frame, gate)?)
        }
        _ => None,
    };

    let to_ds = ds & TO_DS != 0;
    let from_ds = ds & FROM_DS != 0;
    let station = if bssid.is_some() && (to_ds ^ from_ds) {
        let key = if to_ds {
            FieldKey::SourceAddress
        } else {
            FieldKey::DestinationAddress
        };
        frame
            .field(gate, key)?
            .filter(|mac| !is_broadcast_address(mac))
            .as_deref()
            .and_then(canonical_mac)
    } else {
        None
    };

    Ok(FrameFacts::Wireless {
        bssid,
        signal_dbm,
        beacon,
        station,
    })
}

fn beacon_facts<C: DissectionClient>(
    frame: &mut FrameRecord,
    gate: &mut GateGuard<'_, C>,
) -> Result<BeaconFacts> {
    let oui_types = frame.field(gate, FieldKey::TagOuiType)?.unwrap_or_default();
    let tag_numbers = frame.field(gate, FieldKey::TagNumber)?.unwrap_or_default();
    let privacy = frame.field(gate, FieldKey::PrivacyBit)?.unwrap_or_default();
    let channel = frame
        .field(gate, FieldKey::CurrentChannel)?
        .and_then(|v| v.parse::<u16>().ok());
    let ssid = frame.field(gate, FieldKey::Ssid)?.unwrap_or_default();

    Ok(BeaconFacts {
        ssid,
        channel,
        encryption: Encryption::from_beacon_fields(&oui_types, &tag_numbers, &privacy),
    })
}

fn flag(value: Option<String>) -> bool {
    value.as_deref() == Some("1")
}

/// Parse `0x08`, `0x0008` or `8` as hexadecimal.
fn parse_hex(text: &str) -> Option<u16> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).ok()
}
