//! Builds PES packets from access units, delegating codec-specific framing
//! to [`crate::codec`] and wire encoding to [`ts::PesHeader::encode_packet`].

use ts::pes::{STREAM_ID_AUDIO_MIN, STREAM_ID_VIDEO_MIN};
use ts::PesHeader;

use crate::codec::{avcc_sample_to_annex_b, AudioSpecificConfig, AvcDecoderConfigurationRecord};

/// Assemble a PES packet carrying one AAC access unit.
///
/// `pts` is a 90kHz timestamp. AAC access units have no distinct decode time,
/// so DTS is never carried (matches §4.2: PTS-only for audio).
pub fn build_audio_pes(config: &AudioSpecificConfig, payload: &[u8], pts: u64) -> Vec<u8> {
    let framed = config.frame_with_adts(payload);
    PesHeader::encode_packet(STREAM_ID_AUDIO_MIN, Some(pts), None, true, &framed)
}

/// Assemble a PES packet carrying one H.264 access unit.
///
/// When `is_idr` is set, the Annex-B parameter-set prefix (AUD + SPS + PPS)
/// from `config` is prepended to the converted NAL stream.
pub fn build_video_pes(
    config: &AvcDecoderConfigurationRecord,
    payload: &[u8],
    pts: u64,
    dts: u64,
    is_idr: bool,
) -> Vec<u8> {
    let mut es = if is_idr {
        config.annex_b_parameter_set_prefix()
    } else {
        Vec::new()
    };
    es.extend_from_slice(&avcc_sample_to_annex_b(payload, config.length_size));

    let dts_opt = if dts != pts { Some(dts) } else { None };
    PesHeader::encode_packet(STREAM_ID_VIDEO_MIN, Some(pts), dts_opt, true, &es)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts::PesHeader as ParsePesHeader;

    fn asc() -> AudioSpecificConfig {
        AudioSpecificConfig {
            object_type: 2,
            sampling_frequency_index: 4,
            channel_configuration: 2,
        }
    }

    fn avc() -> AvcDecoderConfigurationRecord {
        AvcDecoderConfigurationRecord {
            profile_indication: 0x42,
            profile_compatibility: 0x00,
            level_indication: 0x1E,
            length_size: 4,
            sps: vec![vec![0x67, 0x42, 0x00, 0x1E]],
            pps: vec![vec![0x68, 0xCE, 0x3C, 0x80]],
        }
    }

    #[test]
    fn audio_pes_carries_pts_only_and_adts_payload() {
        let payload = vec![0xAAu8; 20];
        let pes = build_audio_pes(&asc(), &payload, 90_000);
        let header = ParsePesHeader::parse(&pes).unwrap();
        assert!(header.is_audio());
        assert_eq!(header.pts, Some(90_000));
        assert!(header.dts.is_none());
        let es = header.payload(&pes).unwrap();
        assert_eq!(es.len(), 7 + payload.len());
    }

    #[test]
    fn video_pes_non_idr_has_no_parameter_sets() {
        let nal = vec![0x41, 0x01, 0x02];
        let mut sample = Vec::new();
        sample.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        sample.extend_from_slice(&nal);

        let pes = build_video_pes(&avc(), &sample, 180_000, 171_000, false);
        let header = ParsePesHeader::parse(&pes).unwrap();
        assert!(header.is_video());
        assert_eq!(header.pts, Some(180_000));
        assert_eq!(header.dts, Some(171_000));
        let es = header.payload(&pes).unwrap();
        assert_eq!(&es[0..4], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&es[4..7], &nal);
    }

    #[test]
    fn video_pes_idr_prepends_aud_sps_pps() {
        let nal = vec![0x65, 0xAA];
        let mut sample = Vec::new();
        sample.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        sample.extend_from_slice(&nal);

        let pes = build_video_pes(&avc(), &sample, 0, 0, true);
        let header = ParsePesHeader::parse(&pes).unwrap();
        assert_eq!(header.dts, None, "DTS omitted when equal to PTS");
        let es = header.payload(&pes).unwrap();
        assert_eq!(&es[0..6], &crate::codec::AUD_NAL_ANNEX_B);
    }
}
