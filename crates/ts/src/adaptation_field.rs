use bytes::Bytes;

/// Program Clock Reference (PCR) â€” 33-bit base @ 90kHz + 9-bit extension @ 27MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    /// 33-bit base value at 90 kHz
    pub base: u64,
    /// 9-bit extension value at 27 MHz
    pub extension: u16,
}

impl Pcr {
    /// Parse PCR from exactly 6 bytes.
    ///
    /// Layout: `[base32..25][base24..17][base16..9][base8..1][base0 | reserved(6) | ext_high][ext_low]`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 6 {
            return None;
        }
        let base = ((data[0] as u64) << 25)
            | ((data[1] as u64) << 17)
            | ((data[2] as u64) << 9)
            | ((data[3] as u64) << 1)
            | ((data[4] as u64) >> 7);
        let extension = (((data[4] & 0x01) as u16) << 8) | data[5] as u16;
        Some(Pcr { base, extension })
    }

    /// Full PCR value at 27 MHz resolution.
    pub fn as_27mhz(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }

    /// PCR as seconds (floating point).
    pub fn as_seconds(&self) -> f64 {
        self.as_27mhz() as f64 / 27_000_000.0
    }

    /// Build a PCR from a 90kHz timestamp, with a zero extension.
    pub fn from_90khz(base: u64) -> Self {
        Pcr {
            base: base & 0x1_FFFF_FFFF,
            extension: 0,
        }
    }

    /// Encode this PCR into its 6-byte wire representation.
    pub fn to_bytes(&self) -> [u8; 6] {
        let base = self.base & 0x1_FFFF_FFFF;
        let ext = self.extension & 0x1FF;
        [
            (base >> 25) as u8,
            (base >> 17) as u8,
            (base >> 9) as u8,
            (base >> 1) as u8,
            (((base & 0x01) as u8) << 7) | 0x7E | ((ext >> 8) as u8),
            (ext & 0xFF) as u8,
        ]
    }
}

/// Owned adaptation field with all parsed fields.
#[derive(Debug, Clone)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub elementary_stream_priority_indicator: bool,
    pub pcr: Option<Pcr>,
    pub opcr: Option<Pcr>,
    pub splice_countdown: Option<i8>,
    pub transport_private_data: Option<Vec<u8>>,
}

impl AdaptationField {
    /// Parse an adaptation field from its data bytes (after the length byte).
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let flags = data[0];
        let discontinuity_indicator = (flags & 0x80) != 0;
        let random_access_indicator = (flags & 0x40) != 0;
        let elementary_stream_priority_indicator = (flags & 0x20) != 0;
        let pcr_flag = (flags & 0x10) != 0;
        let opcr_flag = (flags & 0x08) != 0;
        let splicing_point_flag = (flags & 0x04) != 0;
        let transport_private_data_flag = (flags & 0x02) != 0;

        let mut offset = 1;

        let pcr = if pcr_flag && offset + 6 <= data.len() {
            let pcr = Pcr::parse(&data[offset..]);
            offset += 6;
            pcr
        } else {
            if pcr_flag {
                offset += 6;
            }
            None
        };

        let opcr = if opcr_flag && offset + 6 <= data.len() {
            let opcr = Pcr::parse(&data[offset..]);
            offset += 6;
            opcr
        } else {
            if opcr_flag {
                offset += 6;
            }
            None
        };

        let splice_countdown = if splicing_point_flag && offset < data.len() {
            let val = data[offset] as i8;
            offset += 1;
            Some(val)
        } else {
            if splicing_point_flag {
                offset += 1;
            }
            None
        };

        let transport_private_data = if transport_private_data_flag && offset < data.len() {
            let length = data[offset] as usize;
            offset += 1;
            if offset + length <= data.len() {
                let private_data = data[offset..offset + length].to_vec();
                Some(private_data)
            } else {
                None
            }
        } else {
            None
        };

        Some(AdaptationField {
            discontinuity_indicator,
            random_access_indicator,
            elementary_stream_priority_indicator,
            pcr,
            opcr,
            splice_countdown,
            transport_private_data,
        })
    }

    /// A bare adaptation field carrying only flags, no PCR.
    pub fn flags_only(random_access_indicator: bool) -> Self {
        AdaptationField {
            discontinuity_indicator: false,
            random_access_indicator,
            elementary_stream_priority_indicator: false,
            pcr: None,
            opcr: None,
            splice_countdown: None,
            transport_private_data: None,
        }
    }

    /// Encode the body of the adaptation field (everything after the length byte),
    /// padded with stuffing bytes (`0xFF`) so the returned buffer is exactly
    /// `body_len` bytes, including the flags byte.
    ///
    /// `body_len` must be at least the minimum size this field needs to encode
    /// (1 for flags, plus 6 per present PCR/OPCR, plus splice/private-data sizes).
    pub fn to_bytes(&self, body_len: usize) -> Vec<u8> {
        let mut flags = 0u8;
        if self.discontinuity_indicator {
            flags |= 0x80;
        }
        if self.random_access_indicator {
            flags |= 0x40;
        }
        if self.elementary_stream_priority_indicator {
            flags |= 0x20;
        }
        if self.pcr.is_some() {
            flags |= 0x10;
        }
        if self.opcr.is_some() {
            flags |= 0x08;
        }
        if self.splice_countdown.is_some() {
            flags |= 0x04;
        }
        if self.transport_private_data.is_some() {
            flags |= 0x02;
        }

        let mut out = vec![flags];
        if let Some(pcr) = self.pcr {
            out.extend_from_slice(&pcr.to_bytes());
        }
        if let Some(opcr) = self.opcr {
            out.extend_from_slice(&opcr.to_bytes());
        }
        if let Some(countdown) = self.splice_countdown {
            out.push(countdown as u8);
        }
        if let Some(private) = &self.transport_private_data {
            out.push(private.len() as u8);
            out.extend_from_slice(private);
        }

        debug_assert!(out.len() <= body_len, "adaptation field body overflow");
        out.resize(body_len, 0xFF);
        out
    }
}

/// Zero-copy adaptation field reference.
///
/// Flags are parsed eagerly; optional fields (PCR, OPCR, etc.) are parsed lazily.
#[derive(Debug, Clone)]
pub struct AdaptationFieldRef {
    data: Bytes,
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub elementary_stream_priority_indicator: bool,
    pcr_flag: bool,
    opcr_flag: bool,
    splicing_point_flag: bool,
    transport_private_data_flag: bool,
}

impl AdaptationFieldRef {
    /// Parse an adaptation field reference from its data bytes (after the length byte).
    pub fn parse(data: Bytes) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let flags = data[0];
        Some(AdaptationFieldRef {
            data,
            discontinuity_indicator: (flags & 0x80) != 0,
            random_access_indicator: (flags & 0x40) != 0,
            elementary_stream_priority_indicator: (flags & 0x20) != 0,
            pcr_flag: (flags & 0x10) != 0,
            opcr_flag: (flags & 0x08) != 0,
            splicing_point_flag: (flags & 0x04) != 0,
            transport_private_data_flag: (flags & 0x02) != 0,
        })
    }

    /// Get PCR if present. Parsed lazily from known offset.
    pub fn pcr(&self) -> Option<Pcr> {
        if !self.pcr_flag {
            return None;
        }
        // PCR starts at offset 1 (after flags byte)
        if self.data.len() < 7 {
            return None;
        }
        Pcr::parse(&self.data[1..])
    }

    /// Get OPCR if present.
    pub fn opcr(&self) -> Option<Pcr> {
        if !self.opcr_flag {
            return None;
        }
        let offset = 1 + if self.pcr_flag { 6 } else { 0 };
        if offset + 6 > self.data.len() {
            return None;
        }
        Pcr::parse(&self.data[offset..])
    }

    /// Get splice countdown if present.
    pub fn splice_countdown(&self) -> Option<i8> {
        if !self.splicing_point_flag {
            return None;
        }
        let offset = 1 + if self.pcr_flag { 6 } else { 0 } + if self.opcr_flag { 6 } else { 0 };
        if offset >= self.data.len() {
            return None;
        }
        Some(self.data[offset] as i8)
    }

    /// Get transport private data if present.
    pub fn transport_private_data(&self) -> Option<Bytes> {
        if !self.transport_private_data_flag {
            return None;
        }
        let offset = 1
            + if self.pcr_flag { 6 } else { 0 }
            + if self.opcr_flag { 6 } else { 0 }
            + if self.splicing_point_flag { 1 } else { 0 };
        if offset >= self.data.len() {
            return None;
        }
        let length = self.data[offset] as usize;
        let data_offset = offset + 1;
        if data_offset + length > self.data.len() {
            return None;
        }
        Some(self.data.slice(data_offset..data_offset + length))
    }
}
