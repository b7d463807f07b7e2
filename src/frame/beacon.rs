//! Beacon recognition straight from raw bytes, without the dissector.
//!
//! Offsets are relative to the start of the 802.11 header, which follows the
//! radiotap preamble on radiotap captures:
//!
//! ```text
//! +0   frame control (0x80 0x00 for a beacon)
//! +16  BSSID (6 bytes)
//! +36  first tagged parameter: number, length, SSID bytes
//! ```

use crate::format::{format_mac, ByteView};
use crate::pcap::LinkType;

/// Frame control byte of a beacon (type 0, subtype 8).
const BEACON_FRAME_CONTROL: u8 = 0x80;

const BSSID_OFFSET: usize = 16;
const SSID_LEN_OFFSET: usize = 37;
const SSID_OFFSET: usize = 38;

/// Length of the radiotap preamble, read from payload offset 2.
pub fn radiotap_len(payload: &[u8]) -> Option<usize> {
    ByteView::new(payload).u16_le(2).map(usize::from)
}

/// Offset of the 802.11 header within the payload.
fn header_start(payload: &[u8], link_type: LinkType) -> Option<usize> {
    if link_type.has_radiotap() {
        radiotap_len(payload)
    } else {
        Some(0)
    }
}

/// Whether the payload carries an 802.11 beacon.
pub fn is_beacon(payload: &[u8], link_type: LinkType) -> bool {
    header_start(payload, link_type)
        .and_then(|start| ByteView::new(payload).u8_at(start))
        .map_or(false, |fc| fc == BEACON_FRAME_CONTROL)
}

/// BSSID of a beacon as canonical colon-hex.
pub fn beacon_bssid(payload: &[u8], link_type: LinkType) -> Option<String> {
    if !is_beacon(payload, link_type) {
        return None;
    }
    let start = header_start(payload, link_type)?;
    let bssid = ByteView::new(payload).slice(start.checked_add(BSSID_OFFSET)?, 6)?;
    format_mac(bssid)
}

/// SSID of a beacon; hidden networks yield an empty string.
pub fn beacon_ssid(payload: &[u8], link_type: LinkType) -> Option<String> {
    if !is_beacon(payload, link_type) {
        return None;
    }
    let start = header_start(payload, link_type)?;
    let view = ByteView::new(payload);
    let len = view.u8_at(start.checked_add(SSID_LEN_OFFSET)?)?;
    let ssid = view.slice(start + SSID_OFFSET, usize::from(len))?;
    Some(String::from_utf8_lossy(ssid).into_owned())
}
