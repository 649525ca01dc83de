//! The muxer engine: owns PIDs, codec configs and timestamps, and drives the
//! PES assembler, TS packetizer, PSI generator and segment writer, per §4.5.

use tracing::debug;
use ts::adaptation_field::Pcr;
use ts::pmt::{PmtStream, StreamType};
use ts::{Pat, Pmt};

use crate::codec::{AudioSpecificConfig, AvcDecoderConfigurationRecord};
use crate::config::MuxerConfig;
use crate::delegate::MuxerDelegate;
use crate::error::{MuxError, Result};
use crate::packetizer::{packetize, ContinuityCounter};
use crate::pes_assembler::{build_audio_pes, build_video_pes};
use crate::psi::packetize_psi_section;
use crate::segment::SegmentWriter;

const TRANSPORT_STREAM_ID: u16 = 1;
const PROGRAM_NUMBER: u16 = 1;

fn flatten(packets: Vec<[u8; 188]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(packets.len() * 188);
    for packet in packets {
        out.extend_from_slice(&packet);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pid {
    Audio,
    Video,
}

/// Live MPEG-2 TS muxer and HLS segment writer.
pub struct Muxer {
    config: MuxerConfig,
    delegate: Box<dyn MuxerDelegate>,
    segment_writer: SegmentWriter,

    audio_config: Option<AudioSpecificConfig>,
    video_config: Option<AvcDecoderConfigurationRecord>,

    pat_cc: ContinuityCounter,
    pmt_cc: ContinuityCounter,
    audio_cc: ContinuityCounter,
    video_cc: ContinuityCounter,

    pcr_pid: u16,
    pcr_pid_locked: bool,
    pcr_interval_ticks: u64,
    pcr_timestamp: Option<u64>,

    running: bool,
    started_session: bool,
}

impl Muxer {
    pub fn new(config: MuxerConfig, delegate: Box<dyn MuxerDelegate>) -> Result<Self> {
        let segment_writer = SegmentWriter::new(&config)?;
        let pcr_interval_ticks = (config.pcr_interval_secs * 90_000.0) as u64;
        let pcr_pid = config.video_pid;
        Ok(Muxer {
            config,
            delegate,
            segment_writer,
            audio_config: None,
            video_config: None,
            pat_cc: ContinuityCounter::default(),
            pmt_cc: ContinuityCounter::default(),
            audio_cc: ContinuityCounter::default(),
            video_cc: ContinuityCounter::default(),
            pcr_pid,
            pcr_pid_locked: false,
            pcr_interval_ticks,
            pcr_timestamp: None,
            running: false,
            started_session: false,
        })
    }

    /// Arm the muxer. Upstream may now deliver configs and samples.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Flush the current segment, finalize the playlist, and reset all
    /// per-session state. Idempotent.
    pub fn stop(&mut self, timestamp: u64) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.segment_writer.stop(timestamp, self.delegate.as_mut())?;
        self.audio_config = None;
        self.video_config = None;
        self.pcr_timestamp = None;
        self.pcr_pid_locked = false;
        self.pcr_pid = self.config.video_pid;
        self.running = false;
        self.started_session = false;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Deliver the AAC `AudioSpecificConfig` for the audio elementary stream.
    ///
    /// A config delivered after the session has already opened its first
    /// segment is a mid-stream reconfig: the PMT picks up the new config at
    /// the next segment start, and that boundary is marked discontinuous.
    pub fn on_audio_config(&mut self, asc_bytes: &[u8]) -> Result<()> {
        let config = AudioSpecificConfig::parse(asc_bytes)?;
        let is_reconfig = self.started_session && self.audio_config.is_some();
        self.audio_config = Some(config);
        self.audio_cc.reset();
        self.lock_pcr_pid_if_unset(Pid::Audio);
        if is_reconfig {
            self.segment_writer.mark_discontinuity();
        }
        Ok(())
    }

    /// Deliver the H.264 `avcC` decoder configuration record for the video
    /// elementary stream. See [`Self::on_audio_config`] for reconfig handling.
    pub fn on_video_config(&mut self, avcc_bytes: &[u8]) -> Result<()> {
        let config = AvcDecoderConfigurationRecord::parse(avcc_bytes)?;
        let is_reconfig = self.started_session && self.video_config.is_some();
        self.video_config = Some(config);
        self.video_cc.reset();
        self.lock_pcr_pid_if_unset(Pid::Video);
        if is_reconfig {
            self.segment_writer.mark_discontinuity();
        }
        Ok(())
    }

    fn lock_pcr_pid_if_unset(&mut self, pid: Pid) {
        if !self.pcr_pid_locked {
            self.pcr_pid = match pid {
                Pid::Audio => self.config.audio_pid,
                Pid::Video => self.config.video_pid,
            };
            self.pcr_pid_locked = true;
        }
    }

    /// Whether upstream has satisfied the configured `expected_medias` gate.
    pub fn can_write_for(&self) -> bool {
        if self.config.expected_medias.is_empty() {
            return self.audio_config.is_some() || self.video_config.is_some();
        }
        (!self.config.expected_medias.audio || self.audio_config.is_some())
            && (!self.config.expected_medias.video || self.video_config.is_some())
    }

    /// Deliver one AAC access unit.
    pub fn on_audio_sample(&mut self, payload: &[u8], pts: u64) -> Result<()> {
        let config = self.audio_config.ok_or(MuxError::AudioConfigMissing)?;
        if !self.running {
            return Err(MuxError::NotRunning);
        }
        if !self.can_write_for() {
            return Ok(());
        }
        let pes = build_audio_pes(&config, payload, pts);
        self.write_sample(Pid::Audio, pes, pts, true)
    }

    /// Deliver one H.264 access unit.
    pub fn on_video_sample(&mut self, payload: &[u8], pts: u64, dts: u64, is_sync: bool) -> Result<()> {
        let config = self
            .video_config
            .clone()
            .ok_or(MuxError::VideoConfigMissing)?;
        if !self.running {
            return Err(MuxError::NotRunning);
        }
        if !self.can_write_for() {
            return Ok(());
        }
        let pes = build_video_pes(&config, payload, pts, dts, is_sync);
        self.write_sample(Pid::Video, pes, pts, is_sync)
    }

    fn write_sample(&mut self, pid: Pid, pes_bytes: Vec<u8>, pts: u64, random_access: bool) -> Result<()> {
        if !self.started_session {
            self.open_session(pts)?;
        } else if self.gates_rotation(pid) && self.segment_writer.should_rotate(pts, random_access) {
            self.rotate_session(pts)?;
        }

        let pid_value = self.pid_value(pid);
        let pcr = self.maybe_pcr(pid_value, pts);

        let cc = self.cc_for(pid);
        let packets = packetize(pid_value, &pes_bytes, cc, pcr, random_access);
        let bytes = flatten(packets);
        self.segment_writer.write(&bytes, self.delegate.as_mut())
    }

    /// Whether a sample on `pid` is allowed to drive the rotation decision.
    ///
    /// Per §3: a segment boundary fires on an IDR when video is among the
    /// expected medias. An audio access unit is always `random_access=true`
    /// (it has no keyframe concept), so once video is expected, audio must
    /// not be allowed to trigger rotation on its own — only the video PID's
    /// IDR boundaries may. When video is not expected, audio is the only
    /// stream available and gates rotation itself.
    fn gates_rotation(&self, pid: Pid) -> bool {
        if self.config.expected_medias.video {
            pid == Pid::Video
        } else {
            true
        }
    }

    fn pid_value(&self, pid: Pid) -> u16 {
        match pid {
            Pid::Audio => self.config.audio_pid,
            Pid::Video => self.config.video_pid,
        }
    }

    fn cc_for(&mut self, pid: Pid) -> &mut ContinuityCounter {
        match pid {
            Pid::Audio => &mut self.audio_cc,
            Pid::Video => &mut self.video_cc,
        }
    }

    fn maybe_pcr(&mut self, pid_value: u16, pts: u64) -> Option<Pcr> {
        if pid_value != self.pcr_pid {
            return None;
        }
        let due = match self.pcr_timestamp {
            None => true,
            Some(last) => pts.saturating_sub(last) >= self.pcr_interval_ticks,
        };
        if due {
            self.pcr_timestamp = Some(pts);
            Some(Pcr::from_90khz(pts))
        } else {
            None
        }
    }

    fn open_session(&mut self, timestamp: u64) -> Result<()> {
        self.segment_writer.begin(timestamp, self.delegate.as_mut())?;
        self.reset_continuity_counters();
        self.emit_psi(timestamp)?;
        self.started_session = true;
        Ok(())
    }

    fn rotate_session(&mut self, timestamp: u64) -> Result<()> {
        self.segment_writer.rotate(timestamp, self.delegate.as_mut())?;
        self.reset_continuity_counters();
        self.emit_psi(timestamp)?;
        Ok(())
    }

    fn reset_continuity_counters(&mut self) {
        self.pat_cc.reset();
        self.pmt_cc.reset();
        self.audio_cc.reset();
        self.video_cc.reset();
    }

    fn build_pmt_streams(&self) -> Vec<PmtStream> {
        let mut streams = Vec::new();
        if self.video_config.is_some() {
            streams.push(PmtStream {
                stream_type: StreamType::H264,
                elementary_pid: self.config.video_pid,
                es_info: Vec::new(),
            });
        }
        if self.audio_config.is_some() {
            streams.push(PmtStream {
                stream_type: StreamType::Aac,
                elementary_pid: self.config.audio_pid,
                es_info: Vec::new(),
            });
        }
        streams
    }

    /// Write a fresh PAT+PMT pair into the current segment file.
    fn emit_psi(&mut self, _timestamp: u64) -> Result<()> {
        let pat = Pat::single_program(TRANSPORT_STREAM_ID, PROGRAM_NUMBER, self.config.pmt_pid);
        let pmt = Pmt::new(PROGRAM_NUMBER, self.pcr_pid, self.build_pmt_streams());
        debug!(pcr_pid = self.pcr_pid, streams = pmt.streams.len(), "Emitting PAT+PMT");

        let mut bytes = Vec::new();
        bytes.extend(flatten(packetize_psi_section(
            self.config.pat_pid,
            &pat.to_section_bytes(),
            &mut self.pat_cc,
        )));
        bytes.extend(flatten(packetize_psi_section(
            self.config.pmt_pid,
            &pmt.to_section_bytes(),
            &mut self.pmt_cc,
        )));
        self.segment_writer.write(&bytes, self.delegate.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpectedMedias;
    use crate::delegate::NullDelegate;
    use ts::packet::TsPacket;
    use ts::PesHeader;
    use bytes::Bytes;

    fn aac_asc() -> Vec<u8> {
        vec![0b00010_010, 0b0_0010_000]
    }

    fn avcc() -> Vec<u8> {
        let sps = vec![0x67, 0x42, 0x00, 0x1E];
        let pps = vec![0x68, 0xCE, 0x3C, 0x80];
        let mut out = vec![0x01, 0x42, 0x00, 0x1E, 0xFF, 0xE1];
        out.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        out.extend_from_slice(&sps);
        out.push(0x01);
        out.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        out.extend_from_slice(&pps);
        out
    }

    fn muxer_in(dir: &tempfile::TempDir, medias: ExpectedMedias) -> Muxer {
        let config = MuxerConfig::new()
            .with_base_folder(dir.path())
            .with_segment_duration(2.0)
            .with_expected_medias(medias);
        Muxer::new(config, Box::new(NullDelegate)).unwrap()
    }

    fn parse_ts_packets(bytes: &[u8]) -> Vec<TsPacket> {
        bytes
            .chunks(188)
            .map(|chunk| TsPacket::parse(Bytes::copy_from_slice(chunk)).unwrap())
            .collect()
    }

    #[test]
    fn audio_only_session_emits_pat_pmt_then_pes() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_ONLY);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        muxer.on_audio_sample(&[0xAA; 50], 0).unwrap();

        let ts_path = dir.path().join("part00000.ts");
        assert!(ts_path.exists());
    }

    #[test]
    fn gate_blocks_writes_until_all_expected_configs_arrive() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_AND_VIDEO);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        muxer.on_audio_sample(&[0xAA; 20], 0).unwrap();

        // no video config yet: nothing should have been written to disk
        let bytes = std::fs::read(dir.path().join("part00000.ts"));
        match bytes {
            Ok(b) => assert!(b.is_empty(), "no PSI or media bytes until gate opens"),
            Err(_) => {} // file may not even exist yet
        }

        muxer.on_video_config(&avcc()).unwrap();
        muxer.on_video_sample(&[0, 0, 0, 4, 0x65, 0xAA, 0xBB, 0xCC], 0, 0, true)
            .unwrap();
        let bytes = std::fs::read(dir.path().join("part00000.ts")).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn first_two_packets_of_a_segment_are_pat_then_pmt() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_ONLY);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        muxer.on_audio_sample(&[0xAA; 20], 0).unwrap();

        let bytes = std::fs::read(dir.path().join("part00000.ts")).unwrap();
        let packets = parse_ts_packets(&bytes);
        assert_eq!(packets[0].pid, 0);
        assert!(packets[0].payload_unit_start_indicator);
        assert_eq!(packets[1].pid, 4095);
        assert!(packets[1].payload_unit_start_indicator);
    }

    #[test]
    fn audio_sample_round_trips_through_adts_and_pes() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_ONLY);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        let payload = vec![0xDEu8, 0xAD, 0xBE, 0xEF];
        muxer.on_audio_sample(&payload, 90_000).unwrap();

        let bytes = std::fs::read(dir.path().join("part00000.ts")).unwrap();
        let packets = parse_ts_packets(&bytes);
        let audio_packet = packets.iter().find(|p| p.pid == 257).unwrap();
        let pes_bytes = audio_packet.payload.clone().unwrap();
        let header = PesHeader::parse(&pes_bytes).unwrap();
        assert_eq!(header.pts, Some(90_000));
        let es = header.payload(&pes_bytes).unwrap();
        // strip the 7-byte ADTS header this muxer synthesized
        assert_eq!(&es[7..], payload.as_slice());
    }

    #[test]
    fn writing_without_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::NONE);
        muxer.start();
        let err = muxer.on_audio_sample(&[0u8; 4], 0).unwrap_err();
        assert!(matches!(err, MuxError::AudioConfigMissing));
    }

    #[test]
    fn rotation_resets_continuity_and_rewrites_psi() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_ONLY);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        muxer.on_audio_sample(&[0xAA; 20], 0).unwrap();
        muxer.on_audio_sample(&[0xAA; 20], 3 * 90_000).unwrap();

        assert!(dir.path().join("part00001.ts").exists());
        let bytes = std::fs::read(dir.path().join("part00001.ts")).unwrap();
        let packets = parse_ts_packets(&bytes);
        assert_eq!(packets[0].pid, 0);
        let audio_packet = packets.iter().find(|p| p.pid == 257).unwrap();
        assert_eq!(
            audio_packet.continuity_counter, 0,
            "audio cc restarts at 0 and this is the first packet on that PID in the new file"
        );
    }

    #[test]
    fn audio_samples_never_trigger_rotation_when_video_is_expected() {
        // Per §3: once video is among expected_medias, only a video IDR may
        // open a segment boundary. Audio access units report
        // random_access=true unconditionally, so without this gate an audio
        // sample past the duration threshold would rotate early.
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_AND_VIDEO);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        muxer.on_video_config(&avcc()).unwrap();
        muxer
            .on_video_sample(&[0, 0, 0, 4, 0x65, 0xAA, 0xBB, 0xCC], 0, 0, true)
            .unwrap();

        // Well past the 2s default segment_duration, but not an IDR: must
        // not rotate.
        for i in 1..=5u64 {
            muxer.on_audio_sample(&[0xAA; 10], i * 90_000).unwrap();
        }
        assert!(!dir.path().join("part00001.ts").exists());

        // A video IDR past the threshold rotates.
        muxer
            .on_video_sample(&[0, 0, 0, 4, 0x65, 0xDD, 0xEE, 0xFF], 3 * 90_000, 3 * 90_000, true)
            .unwrap();
        assert!(dir.path().join("part00001.ts").exists());
    }

    #[test]
    fn mid_stream_video_reconfig_marks_next_rotation_discontinuous() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::VIDEO_ONLY);
        muxer.start();
        muxer.on_video_config(&avcc()).unwrap();
        muxer
            .on_video_sample(&[0, 0, 0, 4, 0x65, 0xAA, 0xBB, 0xCC], 0, 0, true)
            .unwrap();

        // a second avcC after the session has already opened part00000.ts is
        // a mid-stream reconfig, not the initial config.
        muxer.on_video_config(&avcc()).unwrap();
        muxer
            .on_video_sample(&[0, 0, 0, 4, 0x65, 0xDD, 0xEE, 0xFF], 3 * 90_000, 3 * 90_000, true)
            .unwrap();
        assert!(dir.path().join("part00001.ts").exists());

        let playlist = std::fs::read_to_string(dir.path().join("ScreenRecording.m3u8")).unwrap();
        assert!(playlist.contains("#EXT-X-DISCONTINUITY"));
    }

    #[test]
    fn stop_is_idempotent_on_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = muxer_in(&dir, ExpectedMedias::AUDIO_ONLY);
        muxer.start();
        muxer.on_audio_config(&aac_asc()).unwrap();
        muxer.on_audio_sample(&[0xAA; 20], 0).unwrap();
        muxer.stop(90_000).unwrap();
        muxer.stop(90_000).unwrap();
        assert!(!muxer.is_running());
    }
}
