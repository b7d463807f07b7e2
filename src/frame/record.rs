//! A captured frame plus its lazily decoded fields.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{trace, warn};

use super::{beacon, FieldTree};
use crate::dissect::{DecodeHandle, DissectionClient, FieldKey, GateGuard};
use crate::error::{DissectError, Result};
use crate::pcap::{CaptureRecord, LinkType};

/// One captured frame.
///
/// Owns its raw bytes. Decoding goes through the dissection service and is
/// done at most once; the resulting handle must be released with
/// [`cleanup`](Self::cleanup) before the record is dropped. Every method that
/// touches the service takes a [`GateGuard`], so it can only run while the
/// gate is held.
#[derive(Debug)]
pub struct FrameRecord {
    seq: u64,
    link_type: LinkType,
    header: Bytes,
    payload: Bytes,
    handle: Option<DecodeHandle>,
    fields: HashMap<FieldKey, Option<String>>,
}

impl FrameRecord {
    /// Build a frame from raw header and payload bytes (live path).
    pub fn new(seq: u64, link_type: LinkType, header: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            seq,
            link_type,
            header: header.into(),
            payload: payload.into(),
            handle: None,
            fields: HashMap::new(),
        }
    }

    /// Build a frame from a container record (offline path).
    pub fn from_capture(record: &CaptureRecord, link_type: LinkType) -> Self {
        Self::new(record.seq, link_type, record.header.clone(), record.payload.clone())
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn header(&self) -> &Bytes {
        &self.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether a decode handle is currently held.
    pub fn is_dissected(&self) -> bool {
        self.handle.is_some()
    }

    /// Decode the frame if not already decoded.
    pub fn dissect<C: DissectionClient>(&mut self, gate: &mut GateGuard<'_, C>) -> Result<DecodeHandle> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        if self.payload.is_empty() {
            return Err(DissectError::MissingData { seq: self.seq }.into());
        }

        let handle = gate
            .dissect(&self.header, &self.payload, self.link_type)
            .ok_or_else(|| DissectError::Rejected {
                seq: self.seq,
                reason: format!(
                    "{} frame of {} bytes could not be decoded",
                    self.link_type,
                    self.payload.len()
                ),
            })?;

        trace!(seq = self.seq, handle = handle.raw(), "frame dissected");
        self.handle = Some(handle);
        Ok(handle)
    }

    /// Value of `key`, decoding first if needed.
    ///
    /// Answers are cached until [`cleanup`](Self::cleanup), absent fields included.
    pub fn field<C: DissectionClient>(
        &mut self,
        gate: &mut GateGuard<'_, C>,
        key: FieldKey,
    ) -> Result<Option<String>> {
        if let Some(cached) = self.fields.get(&key) {
            return Ok(cached.clone());
        }

        let handle = self.dissect(gate)?;
        let value = gate.field(handle, key).map(|v| v.trim().to_string());
        self.fields.insert(key, value.clone());
        Ok(value)
    }

    /// Every decoded field, arranged by parent.
    pub fn field_tree<C: DissectionClient>(&mut self, gate: &mut GateGuard<'_, C>) -> Result<FieldTree> {
        let handle = self.dissect(gate)?;
        Ok(FieldTree::from_nodes(self.seq, gate.all_fields(handle)))
    }

    /// Release the decode handle and drop cached fields.
    ///
    /// No-op when the frame was never decoded or has already been cleaned up.
    pub fn cleanup<C: DissectionClient>(&mut self, gate: &mut GateGuard<'_, C>) {
        if let Some(handle) = self.handle.take() {
            gate.cleanup(handle);
            trace!(seq = self.seq, handle = handle.raw(), "decode handle released");
        }
        self.fields.clear();
    }

    /// Copy of the raw frame without decode state, for long-term storage.
    pub fn detached(&self) -> Self {
        Self::new(self.seq, self.link_type, self.header.clone(), self.payload.clone())
    }

    /// Whether the raw bytes carry an 802.11 beacon.
    pub fn is_beacon(&self) -> bool {
        beacon::is_beacon(&self.payload, self.link_type)
    }

    /// BSSID read from the raw beacon bytes.
    pub fn beacon_bssid(&self) -> Option<String> {
        beacon::beacon_bssid(&self.payload, self.link_type)
    }

    /// SSID read from the raw beacon bytes.
    pub fn beacon_ssid(&self) -> Option<String> {
        beacon::beacon_ssid(&self.payload, self.link_type)
    }
}

impl Clone for FrameRecord {
    /// Clones never share a decode handle.
    fn clone(&self) -> Self {
        self.detached()
    }
}

impl PartialEq for FrameRecord {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
            && self.link_type == other.link_type
            && self.header == other.header
            && self.payload == other.payload
    }
}

impl Drop for FrameRecord {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            warn!(seq = self.seq, handle = handle.raw(), "frame dropped without releasing its decode handle");
        }
    }
}
