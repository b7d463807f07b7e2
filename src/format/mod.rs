//! Binary and address formatting utilities.
//!
//! - [`ByteView`] - bounds-checked little-endian reads used by every codec
//! - MAC address formatting, parsing and classification

mod address;
mod cursor;

pub use address::{
    canonical_mac, format_mac, is_broadcast_address, parse_mac, BROADCAST_MAC,
};
pub use cursor::ByteView;
