use bytes::Bytes;

use crate::{Result, TsError};

/// Video stream ID range (0xE0..=0xEF)
pub const STREAM_ID_VIDEO_MIN: u8 = 0xE0;
/// Video stream ID range (0xE0..=0xEF)
pub const STREAM_ID_VIDEO_MAX: u8 = 0xEF;
/// Audio stream ID range (0xC0..=0xDF)
pub const STREAM_ID_AUDIO_MIN: u8 = 0xC0;
/// Audio stream ID range (0xC0..=0xDF)
pub const STREAM_ID_AUDIO_MAX: u8 = 0xDF;
/// Private stream 1
pub const STREAM_ID_PRIVATE_1: u8 = 0xBD;
/// Private stream 2
pub const STREAM_ID_PRIVATE_2: u8 = 0xBF;
/// Padding stream
pub const STREAM_ID_PADDING: u8 = 0xBE;

/// Parse a 33-bit PTS or DTS timestamp from 5 bytes.
///
/// Layout: `[marker(4) | ts32..30 | 1 | ts29..15 | 1 | ts14..0 | 1]`
fn parse_timestamp(data: &[u8]) -> Option<u64> {
    if data.len() < 5 {
        return None;
    }
    let ts = (((data[0] as u64 >> 1) & 0x07) << 30)
        | ((data[1] as u64) << 22)
        | (((data[2] as u64 >> 1) & 0x7F) << 15)
        | ((data[3] as u64) << 7)
        | ((data[4] as u64 >> 1) & 0x7F);
    Some(ts)
}

/// Check if a stream_id has an optional PES header (PTS/DTS fields).
fn has_optional_pes_header(stream_id: u8) -> bool {
    // Per ISO 13818-1 Table 2-18, these stream IDs do NOT have optional header:
    !matches!(
        stream_id,
        0xBC   // program_stream_map
        | 0xBE // padding_stream
        | 0xBF // private_stream_2
        | 0xF0 // ECM_stream
        | 0xF1 // EMM_stream
        | 0xFF // program_stream_directory
        | 0xF2 // DSMCC_stream
        | 0xF8 // ITU-T Rec. H.222.1 type E
    )
}

/// Encode a 33-bit PTS or DTS into its 5-byte wire representation.
///
/// `marker` is the 4-bit prefix: `0x2` for PTS-only, `0x3` for PTS-in-PTS+DTS,
/// `0x1` for DTS-in-PTS+DTS.
fn encode_timestamp(marker: u8, ts: u64) -> [u8; 5] {
    let ts = ts & 0x1_FFFF_FFFF;
    [
        (marker << 4) | (((ts >> 29) as u8 & 0x0E)) | 0x01,
        (ts >> 22) as u8,
        (((ts >> 14) as u8) & 0xFE) | 0x01,
        (ts >> 7) as u8,
        (((ts << 1) as u8) & 0xFE) | 0x01,
    ]
}

/// Owned PES header with parsed fields.
#[derive(Debug, Clone)]
pub struct PesHeader {
    pub stream_id: u8,
    pub pes_packet_length: u16,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub data_alignment_indicator: bool,
    pub pes_header_data_length: u8,
    /// Offset to elementary stream data (past the PES header)
    pub payload_offset: usize,
}

impl PesHeader {
    /// Parse PES header from a byte slice starting with the PES start code (0x000001).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(TsError::InsufficientData {
                expected: 6,
                actual: data.len(),
            });
        }

        // Verify start code prefix: 0x00 0x00 0x01
        if data[0] != 0x00 || data[1] != 0x00 || data[2] != 0x01 {
            return Err(TsError::InvalidPesStartCode);
        }

        let stream_id = data[3];
        let pes_packet_length = ((data[4] as u16) << 8) | data[5] as u16;

        if !has_optional_pes_header(stream_id) {
            return Ok(PesHeader {
                stream_id,
                pes_packet_length,
                pts: None,
                dts: None,
                data_alignment_indicator: false,
                pes_header_data_length: 0,
                payload_offset: 6,
            });
        }

        if data.len() < 9 {
            return Err(TsError::InsufficientData {
                expected: 9,
                actual: data.len(),
            });
        }

        let data_alignment_indicator = (data[6] & 0x04) != 0;
        let pts_dts_flags = (data[7] >> 6) & 0x03;
        let pes_header_data_length = data[8];
        let header_end = 9 + pes_header_data_length as usize;

        let (pts, dts) = match pts_dts_flags {
            0b00 => (None, None),
            0b01 => {
                return Err(TsError::InvalidPtsDtsFlags(pts_dts_flags));
            }
            0b10 => {
                // PTS only
                if data.len() < 14 {
                    return Err(TsError::InsufficientData {
                        expected: 14,
                        actual: data.len(),
                    });
                }
                (parse_timestamp(&data[9..14]), None)
            }
            0b11 => {
                // PTS + DTS
                if data.len() < 19 {
                    return Err(TsError::InsufficientData {
                        expected: 19,
                        actual: data.len(),
                    });
                }
                (
                    parse_timestamp(&data[9..14]),
                    parse_timestamp(&data[14..19]),
                )
            }
            _ => unreachable!(),
        };

        Ok(PesHeader {
            stream_id,
            pes_packet_length,
            pts,
            dts,
            data_alignment_indicator,
            pes_header_data_length,
            payload_offset: header_end,
        })
    }

    /// Convert PTS to seconds.
    pub fn pts_seconds(&self) -> Option<f64> {
        self.pts.map(|pts| pts as f64 / 90_000.0)
    }

    /// Convert DTS to seconds.
    pub fn dts_seconds(&self) -> Option<f64> {
        self.dts.map(|dts| dts as f64 / 90_000.0)
    }

    /// Get the elementary stream payload (after PES header).
    pub fn payload<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        if self.payload_offset <= data.len() {
            Some(&data[self.payload_offset..])
        } else {
            None
        }
    }

    /// Check if this is a video stream.
    pub fn is_video(&self) -> bool {
        self.stream_id >= STREAM_ID_VIDEO_MIN && self.stream_id <= STREAM_ID_VIDEO_MAX
    }

    /// Check if this is an audio stream.
    pub fn is_audio(&self) -> bool {
        self.stream_id >= STREAM_ID_AUDIO_MIN && self.stream_id <= STREAM_ID_AUDIO_MAX
    }

    /// Encode a complete PES packet: start code, stream id, optional header
    /// with PTS/DTS, and the elementary stream payload.
    ///
    /// `pes_packet_length` is always 0 (unbounded) for video stream ids, per
    /// convention; for other stream ids it is the true header+payload length,
    /// saturating to 0 if that exceeds 0xFFFF.
    pub fn encode_packet(
        stream_id: u8,
        pts: Option<u64>,
        dts: Option<u64>,
        data_alignment_indicator: bool,
        es_payload: &[u8],
    ) -> Vec<u8> {
        if !has_optional_pes_header(stream_id) {
            let mut out = Vec::with_capacity(6 + es_payload.len());
            out.extend_from_slice(&[0x00, 0x00, 0x01, stream_id]);
            let length = es_payload.len().min(0xFFFF) as u16;
            out.extend_from_slice(&length.to_be_bytes());
            out.extend_from_slice(es_payload);
            return out;
        }

        let (pts_dts_flags, ts_bytes): (u8, Vec<u8>) = match (pts, dts) {
            (None, None) => (0b00, Vec::new()),
            (Some(pts), None) => (0b10, encode_timestamp(0x2, pts).to_vec()),
            (Some(pts), Some(dts)) => {
                let mut v = encode_timestamp(0x3, pts).to_vec();
                v.extend_from_slice(&encode_timestamp(0x1, dts));
                (0b11, v)
            }
            (None, Some(dts)) => (0b10, encode_timestamp(0x2, dts).to_vec()),
        };

        let pes_header_data_length = ts_bytes.len() as u8;
        let header_tail_len = 3 + ts_bytes.len(); // flags byte x2 + length byte + timestamps
        let pes_packet_length_value = header_tail_len + es_payload.len();
        let is_video = (STREAM_ID_VIDEO_MIN..=STREAM_ID_VIDEO_MAX).contains(&stream_id);
        let pes_packet_length = if is_video || pes_packet_length_value > 0xFFFF {
            0
        } else {
            pes_packet_length_value as u16
        };

        let mut out = Vec::with_capacity(9 + ts_bytes.len() + es_payload.len());
        out.extend_from_slice(&[0x00, 0x00, 0x01, stream_id]);
        out.extend_from_slice(&pes_packet_length.to_be_bytes());
        let mut flags1 = 0x80u8;
        if data_alignment_indicator {
            flags1 |= 0x04;
        }
        out.push(flags1);
        out.push(pts_dts_flags << 6);
        out.push(pes_header_data_length);
        out.extend_from_slice(&ts_bytes);
        out.extend_from_slice(es_payload);
        out
    }
}

/// Zero-copy PES header reference.
#[derive(Debug, Clone)]
pub struct PesHeaderRef {
    data: Bytes,
    pub stream_id: u8,
    pub pes_packet_length: u16,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub data_alignment_indicator: bool,
    pub pes_header_data_length: u8,
    payload_offset: usize,
}

impl PesHeaderRef {
    /// Parse PES header from Bytes starting with the PES start code (0x000001).
    pub fn parse(data: Bytes) -> Result<Self> {
        let header = PesHeader::parse(&data)?;
        Ok(PesHeaderRef {
            data,
            stream_id: header.stream_id,
            pes_packet_length: header.pes_packet_length,
            pts: header.pts,
            dts: header.dts,
            data_alignment_indicator: header.data_alignment_indicator,
            pes_header_data_length: header.pes_header_data_length,
            payload_offset: header.payload_offset,
        })
    }

    /// Get the elementary stream payload (after PES header).
    pub fn payload(&self) -> Bytes {
        if self.payload_offset <= self.data.len() {
            self.data.slice(self.payload_offset..)
        } else {
            Bytes::new()
        }
    }

    /// Convert PTS to seconds.
    pub fn pts_seconds(&self) -> Option<f64> {
        self.pts.map(|pts| pts as f64 / 90_000.0)
    }

    /// Convert DTS to seconds.
    pub fn dts_seconds(&self) -> Option<f64> {
        self.dts.map(|dts| dts as f64 / 90_000.0)
    }

    /// Check if this is a video stream.
    pub fn is_video(&self) -> bool {
        self.stream_id >= STREAM_ID_VIDEO_MIN && self.stream_id <= STREAM_ID_VIDEO_MAX
    }

    /// Check if this is an audio stream.
    pub fn is_audio(&self) -> bool {
        self.stream_id >= STREAM_ID_AUDIO_MIN && self.stream_id <= STREAM_ID_AUDIO_MAX
    }
}
