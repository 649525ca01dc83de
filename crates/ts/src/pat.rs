use bytes::{Buf, Bytes};

use crate::crc32::mpeg2_crc32;
use crate::error::TsError;
use crate::Result;

pub const TABLE_ID_PAT: u8 = 0x00;

/// A single program entry in a Program Association Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Owned Program Association Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub programs: Vec<PatProgram>,
}

impl Pat {
    /// Construct a single-section PAT carrying one program, as written by a live muxer.
    pub fn single_program(transport_stream_id: u16, program_number: u16, pmt_pid: u16) -> Self {
        Pat {
            transport_stream_id,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
            programs: vec![PatProgram {
                program_number,
                pmt_pid,
            }],
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(TsError::InsufficientData {
                expected: 8,
                actual: data.len(),
            });
        }
        let mut reader = data;
        let table_id = reader.get_u8();
        if table_id != TABLE_ID_PAT {
            return Err(TsError::InvalidTableId {
                expected: TABLE_ID_PAT,
                actual: table_id,
            });
        }
        let byte1 = reader.get_u8();
        if byte1 & 0x80 == 0 {
            return Err(TsError::ParseError(
                "PAT must have section syntax indicator set".to_string(),
            ));
        }
        let section_length = ((byte1 as u16 & 0x0F) << 8) | reader.get_u8() as u16;
        if section_length < 9 {
            return Err(TsError::InvalidSectionLength(section_length));
        }
        if data.len() < 3 + section_length as usize {
            return Err(TsError::InsufficientData {
                expected: 3 + section_length as usize,
                actual: data.len(),
            });
        }
        let transport_stream_id = reader.get_u16();
        let byte5 = reader.get_u8();
        let version_number = (byte5 >> 1) & 0x1F;
        let current_next_indicator = byte5 & 0x01 != 0;
        let section_number = reader.get_u8();
        let last_section_number = reader.get_u8();

        let programs_end = 3 + section_length as usize - 4;
        let mut programs = Vec::new();
        let mut body = &data[8..programs_end];
        while body.remaining() >= 4 {
            let program_number = body.get_u16();
            let pmt_pid = ((body.get_u8() as u16 & 0x1F) << 8) | body.get_u8() as u16;
            programs.push(PatProgram {
                program_number,
                pmt_pid,
            });
        }

        Ok(Pat {
            transport_stream_id,
            version_number,
            current_next_indicator,
            section_number,
            last_section_number,
            programs,
        })
    }

    pub fn parse_with_crc(data: &[u8]) -> Result<Self> {
        if data.len() >= 7 {
            let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;
            let section_end = 3 + section_length as usize;
            if section_end <= data.len() && section_end >= 4 {
                let calculated = mpeg2_crc32(&data[..section_end]);
                if calculated != 0 {
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

    /// Encode this PAT into a complete PSI section, including the trailing CRC-32/MPEG-2.
    pub fn to_section_bytes(&self) -> Bytes {
        let section_length = 5 + 4 * self.programs.len() + 4;
        let mut out = Vec::with_capacity(3 + section_length);
        out.push(TABLE_ID_PAT);
        out.push(0xB0 | ((section_length as u16 >> 8) as u8 & 0x0F));
        out.push((section_length & 0xFF) as u8);
        out.push((self.transport_stream_id >> 8) as u8);
        out.push((self.transport_stream_id & 0xFF) as u8);
        out.push(
            0xC0 | ((self.version_number & 0x1F) << 1) | u8::from(self.current_next_indicator),
        );
        out.push(self.section_number);
        out.push(self.last_section_number);
        for program in &self.programs {
            out.push((program.program_number >> 8) as u8);
            out.push((program.program_number & 0xFF) as u8);
            out.push(0xE0 | ((program.pmt_pid >> 8) as u8 & 0x1F));
            out.push((program.pmt_pid & 0xFF) as u8);
        }
        let crc = mpeg2_crc32(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        Bytes::from(out)
    }
}
