//! Boundary to the external 802.11 dissection service.
//!
//! This module provides:
//! - [`DissectionClient`], the interface the dissection engine is driven through
//! - [`FieldKey`], the enumerated set of field names the pipeline queries
//! - [`DissectionGate`], the single-slot lock serialising access to the client
//!
//! The dissector itself is not part of this crate. Anything that can turn a
//! (header, payload, link type) triple into a handle and answer field queries
//! against it can be plugged in.

pub mod gate;

use std::fmt;

use crate::pcap::LinkType;

pub use gate::{DissectionGate, GateGuard, DEFAULT_GATE_TIMEOUT};

/// Opaque token for one decoded frame inside the dissection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecodeHandle(u64);

impl DecodeHandle {
    /// Wrap a service-specific handle value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The service-specific handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Declares the field-key enum together with its dissector names.
macro_rules! field_keys {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)+) => {
        /// Fields the pipeline reads from decoded frames.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FieldKey {
            $($(#[$doc])* $variant,)+
        }

        impl FieldKey {
            /// Every known key.
            pub const ALL: &'static [FieldKey] = &[$(FieldKey::$variant,)+];

            /// Dissector field name.
            pub fn name(self) -> &'static str {
                match self {
                    $(FieldKey::$variant => $name,)+
                }
            }

            /// Look up a key by its dissector field name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(FieldKey::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

field_keys! {
    /// Colon-separated protocol stack, e.g. `radiotap:wlan_radio:wlan`
    FrameProtocols => "frame.protocols",
    FrameTime => "frame.time",
    FrameLen => "frame.len",
    /// Frame control type (`0x00` management, `0x02` data)
    FcType => "wlan.fc.type",
    /// Frame control type/subtype, `0x08` for beacons
    FcTypeSubtype => "wlan.fc.type_subtype",
    FcsGood => "wlan.fcs_good",
    Bssid => "wlan.bssid",
    SourceAddress => "wlan.sa",
    DestinationAddress => "wlan.da",
    /// DS status flags: `0x01` toDS, `0x02` fromDS, `0x03` both
    DsStatus => "wlan.fc.ds",
    SignalDbm => "radiotap.dbm_antsignal",
    /// Comma-separated vendor OUI types
    TagOuiType => "wlan_mgt.tag.oui.type",
    /// Comma-separated tagged parameter numbers
    TagNumber => "wlan_mgt.tag.number",
    PrivacyBit => "wlan_mgt.fixed.capabilities.privacy",
    CurrentChannel => "wlan_mgt.ds.current_channel",
    Ssid => "wlan_mgt.ssid",
    KeyAck => "eapol.keydes.key_info.key_ack",
    KeyMic => "eapol.keydes.key_info.key_mic",
    KeyInstall => "eapol.keydes.key_info.install",
    KeyDataLength => "eapol.keydes.datalen",
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a full field dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    /// Dissector field name
    pub key: String,
    /// Parent field name; `None` for top-level protocol nodes
    pub parent: Option<String>,
    /// Human-readable label
    pub description: String,
    /// Displayed value
    pub value: String,
}

/// Interface of the external dissection service.
///
/// Implementations are not expected to be reentrant; the pipeline only calls
/// them through a [`DissectionGate`].
pub trait DissectionClient: Send {
    /// Decode one frame. Returns `None` when the service cannot decode it.
    fn dissect(&mut self, header: &[u8], payload: &[u8], link_type: LinkType) -> Option<DecodeHandle>;

    /// Value of `key` in a decoded frame, `None` if the field is absent.
    fn field(&mut self, handle: DecodeHandle, key: FieldKey) -> Option<String>;

    /// Every field of a decoded frame in dissection order.
    ///
    /// Keys may repeat (e.g. one entry per tagged parameter).
    fn all_fields(&mut self, handle: DecodeHandle) -> Vec<FieldNode> {
        let _ = handle;
        Vec::new()
    }

    /// Release a handle. Called exactly once per successful `dissect`.
    fn cleanup(&mut self, handle: DecodeHandle);
}

impl<C: DissectionClient + ?Sized> DissectionClient for Box<C> {
    fn dissect(&mut self, header: &[u8], payload: &[u8], link_type: LinkType) -> Option<DecodeHandle> {
        (**self).dissect(header, payload, link_type)
    }

    fn field(&mut self, handle: DecodeHandle, key: FieldKey) -> Option<String> {
        (**self).field(handle, key)
    }

    fn all_fields(&mut self, handle: DecodeHandle) -> Vec<FieldNode> {
        (**self).all_fields(handle)
    }

    fn cleanup(&mut self, handle: DecodeHandle) {
        (**self).cleanup(handle)
    }
}
