//! Construction-side helpers for the two codec configuration records this
//! muxer understands: AAC `AudioSpecificConfig` (used to synthesize ADTS
//! headers) and the H.264 AVC decoder configuration record (used to convert
//! length-prefixed access units to Annex-B and to prepend parameter sets to
//! IDR pictures).
//!
//! This module builds these records; it is not a general-purpose bitstream
//! parser for either codec.

use crate::error::{MuxError, Result};

/// AUD (access unit delimiter) NAL unit, `primary_pic_type = 7` (any slice type).
pub const AUD_NAL_ANNEX_B: [u8; 6] = [0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];

/// The 2-byte (or longer, for SBR/PS extensions which this muxer ignores)
/// MPEG-4 `AudioSpecificConfig`, as delivered by an AAC encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub object_type: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
}

impl AudioSpecificConfig {
    /// Parse the first two bytes of an `AudioSpecificConfig`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(MuxError::AudioConfigMissing);
        }
        let object_type = data[0] >> 3;
        let sampling_frequency_index = ((data[0] & 0x07) << 1) | (data[1] >> 7);
        let channel_configuration = (data[1] >> 3) & 0x0F;
        Ok(AudioSpecificConfig {
            object_type,
            sampling_frequency_index,
            channel_configuration,
        })
    }

    /// Synthesize a 7-byte ADTS header (no CRC) for a raw AAC frame of
    /// `payload_len` bytes.
    pub fn adts_header(&self, payload_len: usize) -> [u8; 7] {
        let frame_length = (7 + payload_len) as u16 & 0x1FFF;
        let profile = self.object_type.saturating_sub(1) & 0x03;
        let mut header = [0u8; 7];
        header[0] = 0xFF;
        header[1] = 0xF1; // MPEG-4, layer 00, protection_absent=1
        header[2] = (profile << 6)
            | ((self.sampling_frequency_index & 0x0F) << 2)
            | ((self.channel_configuration >> 2) & 0x01);
        header[3] = ((self.channel_configuration & 0x03) << 6) | ((frame_length >> 11) as u8 & 0x03);
        header[4] = (frame_length >> 3) as u8;
        header[5] = ((frame_length & 0x07) as u8) << 5 | 0x1F;
        header[6] = 0xFC;
        header
    }

    /// Prefix a raw AAC access unit with its ADTS header.
    pub fn frame_with_adts(&self, payload: &[u8]) -> Vec<u8> {
        let header = self.adts_header(payload.len());
        let mut out = Vec::with_capacity(7 + payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
        out
    }
}

/// H.264 `avcC` decoder configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcDecoderConfigurationRecord {
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    /// Byte length of the NAL-unit length prefix used in samples (1, 2 or 4).
    pub length_size: usize,
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
}

impl AvcDecoderConfigurationRecord {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(MuxError::VideoConfigMissing);
        }
        let profile_indication = data[1];
        let profile_compatibility = data[2];
        let level_indication = data[3];
        let length_size = ((data[4] & 0x03) as usize) + 1;

        let mut offset = 5;
        let num_sps = (data[offset] & 0x1F) as usize;
        offset += 1;
        let mut sps = Vec::with_capacity(num_sps);
        for _ in 0..num_sps {
            if offset + 2 > data.len() {
                return Err(MuxError::VideoConfigMissing);
            }
            let len = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
            offset += 2;
            if offset + len > data.len() {
                return Err(MuxError::VideoConfigMissing);
            }
            sps.push(data[offset..offset + len].to_vec());
            offset += len;
        }

        if offset >= data.len() {
            return Err(MuxError::VideoConfigMissing);
        }
        let num_pps = data[offset] as usize;
        offset += 1;
        let mut pps = Vec::with_capacity(num_pps);
        for _ in 0..num_pps {
            if offset + 2 > data.len() {
                return Err(MuxError::VideoConfigMissing);
            }
            let len = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
            offset += 2;
            if offset + len > data.len() {
                return Err(MuxError::VideoConfigMissing);
            }
            pps.push(data[offset..offset + len].to_vec());
            offset += len;
        }

        Ok(AvcDecoderConfigurationRecord {
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size,
            sps,
            pps,
        })
    }

    /// AUD + SPS + PPS, each Annex-B start-code prefixed, to be prepended to
    /// the first NAL of an IDR access unit.
    pub fn annex_b_parameter_set_prefix(&self) -> Vec<u8> {
        let mut out = Vec::from(AUD_NAL_ANNEX_B);
        for sps in &self.sps {
            out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            out.extend_from_slice(sps);
        }
        for pps in &self.pps {
            out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            out.extend_from_slice(pps);
        }
        out
    }
}

/// Convert a length-prefixed NAL-unit access unit (as delivered by most H.264
/// encoders, e.g. `CMSampleBuffer`/`avcC`-style framing) into an Annex-B
/// stream by replacing each length prefix with a `0x00000001` start code.
pub fn avcc_sample_to_annex_b(sample: &[u8], length_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(sample.len() + 16);
    let mut offset = 0;
    while offset + length_size <= sample.len() {
        let nal_len = match length_size {
            1 => sample[offset] as usize,
            2 => u16::from_be_bytes([sample[offset], sample[offset + 1]]) as usize,
            4 => u32::from_be_bytes([
                sample[offset],
                sample[offset + 1],
                sample[offset + 2],
                sample[offset + 3],
            ]) as usize,
            _ => break,
        };
        offset += length_size;
        if offset + nal_len > sample.len() {
            break;
        }
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        out.extend_from_slice(&sample[offset..offset + nal_len]);
        offset += nal_len;
    }
    out
}
