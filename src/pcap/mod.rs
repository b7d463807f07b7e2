//! Capture container codec.
//!
//! Reads and writes pcap containers with random access through an offset
//! index, and reads the ivs compact format. Pure binary codec: no knowledge of
//! 802.11 beyond the link-type numbering.

mod index;
pub mod ivs;
mod link_type;
mod packet;
mod reader;
mod writer;

pub use index::{ContainerIndex, SeekRead};
pub use ivs::IvsContainer;
pub use link_type::LinkType;
pub use packet::{CaptureRecord, PcapRecordHeader, PCAP_RECORD_HEADER_LEN};
pub use reader::{is_gzip_extension, ContainerKind, PcapContainer, PCAP_GLOBAL_HEADER_LEN, PCAP_MAGIC};
pub use writer::{concat, global_header, write, PcapWriter};
