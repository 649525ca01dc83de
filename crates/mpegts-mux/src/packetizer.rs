//! Fragments a PES packet across 188-byte TS packets, per §4.3.

use ts::adaptation_field::{AdaptationField, Pcr};
use ts::packet::TsPacket;

const TS_PACKET_SIZE: usize = 188;
const TS_HEADER_SIZE: usize = 4;
const MAX_PAYLOAD_PER_PACKET: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;

/// Per-PID continuity counter, incremented once per emitted packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuityCounter(u8);

impl ContinuityCounter {
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    fn next(&mut self) -> u8 {
        let value = self.0;
        self.0 = (self.0 + 1) & 0x0F;
        value
    }
}

/// Fragment `pes_bytes` into one or more 188-byte TS packets on `pid`.
///
/// When `pcr` is `Some`, the first packet carries it in its adaptation field
/// alongside `random_access`. The final packet is padded via adaptation-field
/// stuffing when its payload would be shorter than 184 bytes.
pub fn packetize(
    pid: u16,
    pes_bytes: &[u8],
    cc: &mut ContinuityCounter,
    pcr: Option<Pcr>,
    random_access: bool,
) -> Vec<[u8; 188]> {
    let mut packets = Vec::with_capacity(pes_bytes.len().div_ceil(MAX_PAYLOAD_PER_PACKET) + 1);
    let mut offset = 0;
    let mut first = true;

    loop {
        let remaining = pes_bytes.len() - offset;
        let is_last = remaining <= MAX_PAYLOAD_PER_PACKET;
        let chunk_len = remaining.min(MAX_PAYLOAD_PER_PACKET);

        let needs_adaptation_field = first && (pcr.is_some() || random_access);
        let stuffing_needed = is_last && chunk_len < MAX_PAYLOAD_PER_PACKET;

        let packet = if needs_adaptation_field || stuffing_needed {
            let mut field = AdaptationField::flags_only(first && random_access);
            if first {
                field.pcr = pcr;
            }
            let min_body = 1 + if field.pcr.is_some() { 6 } else { 0 };
            let target_payload_len = if stuffing_needed {
                chunk_len
            } else {
                MAX_PAYLOAD_PER_PACKET - min_body - 1
            };
            let body_len = (MAX_PAYLOAD_PER_PACKET - 1 - target_payload_len).max(min_body);
            let body = field.to_bytes(body_len);
            let mut af = Vec::with_capacity(1 + body.len());
            af.push(body.len() as u8);
            af.extend_from_slice(&body);

            let payload_len = MAX_PAYLOAD_PER_PACKET - af.len();
            let payload = &pes_bytes[offset..offset + payload_len];
            offset += payload_len;

            TsPacket::encode_packet(pid, first, cc.next(), Some(&af), payload)
        } else {
            let payload = &pes_bytes[offset..offset + chunk_len];
            offset += chunk_len;
            TsPacket::encode_packet(pid, first, cc.next(), None, payload)
        };

        packets.push(packet);
        first = false;

        if offset >= pes_bytes.len() {
            break;
        }
    }

    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn single_packet_payload_fits_with_pcr_and_rai() {
        let payload = vec![0xABu8; 100];
        let mut cc = ContinuityCounter::default();
        let packets = packetize(256, &payload, &mut cc, Some(Pcr::from_90khz(90_000)), true);
        assert_eq!(packets.len(), 1);

        let parsed = TsPacket::parse(Bytes::copy_from_slice(&packets[0])).unwrap();
        assert!(parsed.payload_unit_start_indicator);
        assert!(parsed.has_random_access_indicator());
        let af = parsed.parse_adaptation_field().unwrap();
        assert_eq!(af.pcr.unwrap().base, 90_000);
        assert_eq!(parsed.payload.unwrap().len(), payload.len());
    }

    #[test]
    fn multi_packet_splits_across_packets_with_monotone_continuity() {
        let payload = vec![0x11u8; 184 * 3 + 50];
        let mut cc = ContinuityCounter::default();
        let packets = packetize(257, &payload, &mut cc, None, false);
        assert_eq!(packets.len(), 4);

        let mut expected_cc = 0u8;
        let mut total_payload = Vec::new();
        for (i, raw) in packets.iter().enumerate() {
            let parsed = TsPacket::parse(Bytes::copy_from_slice(raw)).unwrap();
            assert_eq!(parsed.pid, 257);
            assert_eq!(parsed.payload_unit_start_indicator, i == 0);
            assert_eq!(parsed.continuity_counter, expected_cc);
            expected_cc = (expected_cc + 1) & 0x0F;
            if let Some(p) = parsed.payload {
                total_payload.extend_from_slice(&p);
            }
        }
        assert_eq!(total_payload, payload);
    }

    #[test]
    fn last_packet_pads_short_payload_via_adaptation_field() {
        let payload = vec![0x22u8; 184 + 10];
        let mut cc = ContinuityCounter::default();
        let packets = packetize(256, &payload, &mut cc, None, false);
        assert_eq!(packets.len(), 2);
        let last = TsPacket::parse(Bytes::copy_from_slice(&packets[1])).unwrap();
        assert!(last.has_adaptation_field());
        assert_eq!(last.payload.unwrap().len(), 10);
    }

    #[test]
    fn continuity_counter_wraps_mod_16() {
        let mut cc = ContinuityCounter::default();
        for _ in 0..16 {
            cc.next();
        }
        assert_eq!(cc.0, 0);
    }
}
