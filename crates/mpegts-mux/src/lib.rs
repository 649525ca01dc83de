//! Live MPEG-2 Transport Stream (TS) muxer and HLS segment writer.
//!
//! Ingests AAC (ADTS/ASC configured) and H.264 (AVC configured) access units
//! carrying presentation and decode timestamps, and emits 188-byte TS packets
//! grouped into fixed-duration HLS segments with a rolling `.m3u8` playlist.
//!
//! Built on top of the sibling `ts` crate's wire types (`Pat`, `Pmt`,
//! `TsPacket`, `PesHeader`, `AdaptationField`): this crate adds the
//! construction/encode side, `ts` already provides the parser.

pub mod codec;
pub mod config;
pub mod delegate;
pub mod engine;
pub mod error;
pub mod packetizer;
pub mod pes_assembler;
pub mod psi;
pub mod segment;

pub use codec::{AudioSpecificConfig, AvcDecoderConfigurationRecord};
pub use config::{ExpectedMedias, MuxerConfig};
pub use delegate::{MuxerDelegate, NullDelegate};
pub use engine::Muxer;
pub use error::{MuxError, Result, WriterErrorKind};
