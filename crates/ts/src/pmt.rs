use bytes::{Buf, Bytes};

use crate::crc32::mpeg2_crc32;
use crate::error::TsError;
use crate::Result;

pub const TABLE_ID_PMT: u8 = 0x02;

/// Elementary stream type, as carried in the PMT stream loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Mpeg2Video,
    H264,
    H265,
    Aac,
    Ac3,
    Eac3,
    Mpeg1Audio,
    Unknown(u8),
}

impl StreamType {
    pub fn is_video(&self) -> bool {
        matches!(self, StreamType::Mpeg2Video | StreamType::H264 | StreamType::H265)
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            StreamType::Aac | StreamType::Ac3 | StreamType::Eac3 | StreamType::Mpeg1Audio
        )
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            StreamType::Mpeg2Video => 0x02,
            StreamType::H264 => 0x1B,
            StreamType::H265 => 0x24,
            StreamType::Aac => 0x0F,
            StreamType::Ac3 => 0x81,
            StreamType::Eac3 => 0x87,
            StreamType::Mpeg1Audio => 0x03,
            StreamType::Unknown(v) => *v,
        }
    }
}

impl From<u8> for StreamType {
    fn from(value: u8) -> Self {
        match value {
            0x02 => StreamType::Mpeg2Video,
            0x1B => StreamType::H264,
            0x24 => StreamType::H265,
            0x0F => StreamType::Aac,
            0x81 => StreamType::Ac3,
            0x87 => StreamType::Eac3,
            0x03 => StreamType::Mpeg1Audio,
            other => StreamType::Unknown(other),
        }
    }
}

/// A single elementary stream entry in a Program Map Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    pub stream_type: StreamType,
    pub elementary_pid: u16,
    /// Raw ES-info descriptor loop bytes (empty for a bare elementary stream).
    pub es_info: Vec<u8>,
}

/// Owned Program Map Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub pcr_pid: u16,
    pub program_info: Vec<u8>,
    pub streams: Vec<PmtStream>,
}

impl Pmt {
    pub fn new(program_number: u16, pcr_pid: u16, streams: Vec<PmtStream>) -> Self {
        Pmt {
            program_number,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
            pcr_pid,
            program_info: Vec::new(),
            streams,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(TsError::InsufficientData {
                expected: 12,
                actual: data.len(),
            });
        }
        let mut reader = data;
        let table_id = reader.get_u8();
        if table_id != TABLE_ID_PMT {
            return Err(TsError::InvalidTableId {
                expected: TABLE_ID_PMT,
                actual: table_id,
            });
        }
        let byte1 = reader.get_u8();
        if byte1 & 0x80 == 0 {
            return Err(TsError::ParseError(
                "PMT must have section syntax indicator set".to_string(),
            ));
        }
        let section_length = ((byte1 as u16 & 0x0F) << 8) | reader.get_u8() as u16;
        if section_length < 13 {
            return Err(TsError::InvalidSectionLength(section_length));
        }
        if data.len() < 3 + section_length as usize {
            return Err(TsError::InsufficientData {
                expected: 3 + section_length as usize,
                actual: data.len(),
            });
        }
        let program_number = reader.get_u16();
        let byte5 = reader.get_u8();
        let version_number = (byte5 >> 1) & 0x1F;
        let current_next_indicator = byte5 & 0x01 != 0;
        let section_number = reader.get_u8();
        let last_section_number = reader.get_u8();
        let pcr_pid = ((reader.get_u8() as u16 & 0x1F) << 8) | reader.get_u8() as u16;
        let program_info_length = ((reader.get_u8() as u16 & 0x0F) << 8) | reader.get_u8() as u16;
        let program_info_length = program_info_length as usize;

        if (section_length as usize) < 9 + program_info_length + 4 {
            return Err(TsError::InvalidSectionLength(section_length));
        }

        let program_info_start = 12;
        let program_info =
            data[program_info_start..program_info_start + program_info_length].to_vec();

        let streams_end = 3 + section_length as usize - 4;
        let mut body = &data[program_info_start + program_info_length..streams_end];
        let mut streams = Vec::new();
        while body.remaining() >= 5 {
            let stream_type = StreamType::from(body.get_u8());
            let elementary_pid = ((body.get_u8() as u16 & 0x1F) << 8) | body.get_u8() as u16;
            let es_info_length = ((body.get_u8() as u16 & 0x0F) << 8) | body.get_u8() as u16;
            let es_info_length = es_info_length as usize;
            if body.remaining() < es_info_length {
                return Err(TsError::InsufficientData {
                    expected: es_info_length,
                    actual: body.remaining(),
                });
            }
            let es_info = body[..es_info_length].to_vec();
            body.advance(es_info_length);
            streams.push(PmtStream {
                stream_type,
                elementary_pid,
                es_info,
            });
        }

        Ok(Pmt {
            program_number,
            version_number,
            current_next_indicator,
            section_number,
            last_section_number,
            pcr_pid,
            program_info,
            streams,
        })
    }

    pub fn parse_with_crc(data: &[u8]) -> Result<Self> {
        if data.len() >= 7 {
            let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;
            let section_end = 3 + section_length as usize;
            if section_end <= data.len() && section_end >= 4 {
                let full_crc = mpeg2_crc32(&data[..section_end]);
                if full_crc != 0 {
                    let stored = u32::from_be_bytes([
                        data[section_end - 4],
                        data[section_end - 3],
                        data[section_end - 2],
                        data[section_end - 1],
                    ]);
                    let calculated = mpeg2_crc32(&data[..section_end - 4]);
                    return Err(TsError::Crc32Mismatch {
                        expected: stored,
                        calculated,
                    });
                }
            }
        }
        Self::parse(data)
    }

    /// Encode this PMT into a complete PSI section, including the trailing CRC-32/MPEG-2.
    pub fn to_section_bytes(&self) -> Bytes {
        let section_length =
            9 + self.program_info.len() + self.streams.iter().map(|s| 5 + s.es_info.len()).sum::<usize>() + 4;
        let mut out = Vec::with_capacity(3 + section_length);
        out.push(TABLE_ID_PMT);
        out.push(0xB0 | ((section_length as u16 >> 8) as u8 & 0x0F));
        out.push((section_length & 0xFF) as u8);
        out.push((self.program_number >> 8) as u8);
        out.push((self.program_number & 0xFF) as u8);
        out.push(
            0xC0 | ((self.version_number & 0x1F) << 1) | u8::from(self.current_next_indicator),
        );
        out.push(self.section_number);
        out.push(self.last_section_number);
        out.push(0xE0 | ((self.pcr_pid >> 8) as u8 & 0x1F));
        out.push((self.pcr_pid & 0xFF) as u8);
        out.push(0xF0 | ((self.program_info.len() as u16 >> 8) as u8 & 0x0F));
        out.push((self.program_info.len() & 0xFF) as u8);
        out.extend_from_slice(&self.program_info);
        for stream in &self.streams {
            out.push(stream.stream_type.as_u8());
            out.push(0xE0 | ((stream.elementary_pid >> 8) as u8 & 0x1F));
            out.push((stream.elementary_pid & 0xFF) as u8);
            out.push(0xF0 | ((stream.es_info.len() as u16 >> 8) as u8 & 0x0F));
            out.push((stream.es_info.len() & 0xFF) as u8);
            out.extend_from_slice(&stream.es_info);
        }
        let crc = mpeg2_crc32(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        Bytes::from(out)
    }
}
