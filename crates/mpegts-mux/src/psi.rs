//! Wraps `ts::Pat` / `ts::Pmt` sections into TS packets, per §4.4.

use ts::packet::TsPacket;

use crate::packetizer::ContinuityCounter;

const TS_PACKET_SIZE: usize = 188;
const TS_HEADER_SIZE: usize = 4;
const MAX_PAYLOAD_PER_PACKET: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;

/// Wrap a PSI section (PAT or PMT, already including its trailing CRC-32) into
/// one or more TS packets on `pid`, each with a leading `pointer_field`.
///
/// PAT and PMT sections in this muxer are small enough to fit in a single
/// packet; the multi-packet path exists for correctness, not because it is
/// expected to trigger.
pub fn packetize_psi_section(pid: u16, section: &[u8], cc: &mut ContinuityCounter) -> Vec<[u8; 188]> {
    let mut payload = Vec::with_capacity(1 + section.len());
    payload.push(0u8); // pointer_field: section starts immediately
    payload.extend_from_slice(section);

    let mut packets = Vec::with_capacity(payload.len().div_ceil(MAX_PAYLOAD_PER_PACKET));
    let mut offset = 0;
    let mut first = true;
    while offset < payload.len() {
        let remaining = payload.len() - offset;
        let chunk_len = remaining.min(MAX_PAYLOAD_PER_PACKET);
        let mut chunk = payload[offset..offset + chunk_len].to_vec();
        if chunk.len() < MAX_PAYLOAD_PER_PACKET {
            chunk.resize(MAX_PAYLOAD_PER_PACKET, 0xFF);
        }
        packets.push(TsPacket::encode_packet(pid, first, cc.next(), None, &chunk));
        offset += chunk_len;
        first = false;
    }
    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ts::{Pat, Pmt, PmtStream, StreamType};

    #[test]
    fn pat_round_trips_through_wrapped_packet() {
        let pat = Pat::single_program(1, 1, 4095);
        let section = pat.to_section_bytes();
        let mut cc = ContinuityCounter::default();
        let packets = packetize_psi_section(0, &section, &mut cc);
        assert_eq!(packets.len(), 1);

        let parsed = TsPacket::parse(Bytes::copy_from_slice(&packets[0])).unwrap();
        assert_eq!(parsed.pid, 0);
        assert!(parsed.payload_unit_start_indicator);
        let psi_payload = parsed.get_psi_payload().unwrap();
        let reparsed = Pat::parse(&psi_payload).unwrap();
        assert_eq!(reparsed, pat);
    }

    #[test]
    fn pmt_round_trips_through_wrapped_packet() {
        let pmt = Pmt::new(
            1,
            256,
            vec![
                PmtStream {
                    stream_type: StreamType::H264,
                    elementary_pid: 256,
                    es_info: Vec::new(),
                },
                PmtStream {
                    stream_type: StreamType::Aac,
                    elementary_pid: 257,
                    es_info: Vec::new(),
                },
            ],
        );
        let section = pmt.to_section_bytes();
        let mut cc = ContinuityCounter::default();
        let packets = packetize_psi_section(4095, &section, &mut cc);
        assert_eq!(packets.len(), 1);

        let parsed = TsPacket::parse(Bytes::copy_from_slice(&packets[0])).unwrap();
        assert_eq!(parsed.pid, 4095);
        let psi_payload = parsed.get_psi_payload().unwrap();
        let reparsed = Pmt::parse(&psi_payload).unwrap();
        assert_eq!(reparsed, pmt);
    }
}
