//! Captured frames and their decoded fields.
//!
//! - [`FrameRecord`] - raw bytes plus lazy, cached field access
//! - [`FieldTree`] - parent/child view over a full field dump
//! - [`beacon`] - beacon recognition on raw bytes, without the dissector

pub mod beacon;
mod fields;
mod record;

pub use fields::{FieldEntry, FieldTree};
pub use record::FrameRecord;
