//! MAC address formatting and classification.
//!
//! Every MAC that becomes a table key goes through [`canonical_mac`], so the raw
//! beacon path (bytes) and the dissector path (strings, often lowercase) agree on
//! the same key.

/// The all-ones broadcast address in canonical form.
pub const BROADCAST_MAC: &str = "FF:FF:FF:FF:FF:FF";

/// Format 6 bytes as a canonical MAC string (uppercase, colon separated).
///
/// Returns `None` if the slice is not exactly 6 bytes.
///
/// # Example
///
/// ```
/// use wlanscope::format::format_mac;
///
/// let bytes = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
/// assert_eq!(format_mac(&bytes), Some("AA:BB:CC:DD:EE:FF".to_string()));
/// ```
pub fn format_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    Some(format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
    ))
}

/// Parse a MAC address written as six hex octets separated by `:` or `-`.
pub fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.trim().split([':', '-']);
    for octet in mac.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

/// Normalize a MAC string to the canonical key form.
///
/// # Example
///
/// ```
/// use wlanscope::format::canonical_mac;
///
/// assert_eq!(canonical_mac("aa:bb:cc:dd:ee:ff").as_deref(), Some("AA:BB:CC:DD:EE:FF"));
/// assert_eq!(canonical_mac("not a mac"), None);
/// ```
pub fn canonical_mac(text: &str) -> Option<String> {
    parse_mac(text).and_then(|mac| format_mac(&mac))
}

/// Whether a MAC string is a group (broadcast or multicast) address.
///
/// Only the group bit of the first octet is checked (first octet value modulo 2),
/// so `01:00:5E:..` counts as broadcast just like `FF:FF:..`.
pub fn is_broadcast_address(mac: &str) -> bool {
    let first = mac.trim().split([':', '-']).next().unwrap_or("");
    match u8::from_str_radix(first, 16) {
        Ok(octet) => octet % 2 != 0,
        Err(_) => false,
    }
}
