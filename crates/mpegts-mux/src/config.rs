use std::path::PathBuf;

/// Which elementary streams the muxer must see configured before it starts
/// emitting any bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedMedias {
    pub audio: bool,
    pub video: bool,
}

impl ExpectedMedias {
    pub const NONE: Self = ExpectedMedias {
        audio: false,
        video: false,
    };
    pub const AUDIO_ONLY: Self = ExpectedMedias {
        audio: true,
        video: false,
    };
    pub const VIDEO_ONLY: Self = ExpectedMedias {
        audio: false,
        video: true,
    };
    pub const AUDIO_AND_VIDEO: Self = ExpectedMedias {
        audio: true,
        video: true,
    };

    /// `true` when no media is required, i.e. the muxer starts on whatever arrives first.
    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }
}

impl Default for ExpectedMedias {
    fn default() -> Self {
        Self::NONE
    }
}

/// Configuration for a [`crate::engine::Muxer`] instance.
///
/// Mirrors the `with_*` builder convention used by `ts::TsParser`/`ts::OwnedTsParser`.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    pub(crate) pat_pid: u16,
    pub(crate) pmt_pid: u16,
    pub(crate) video_pid: u16,
    pub(crate) audio_pid: u16,
    pub(crate) segment_duration_secs: f64,
    pub(crate) expected_medias: ExpectedMedias,
    pub(crate) base_folder: Option<PathBuf>,
    pub(crate) segment_max_count: usize,
    pub(crate) pcr_interval_secs: f64,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        MuxerConfig {
            pat_pid: 0x0000,
            pmt_pid: 4095,
            video_pid: 256,
            audio_pid: 257,
            segment_duration_secs: 2.0,
            expected_medias: ExpectedMedias::NONE,
            base_folder: None,
            segment_max_count: 10_000,
            pcr_interval_secs: 0.020,
        }
    }
}

impl MuxerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pat_pid(mut self, pid: u16) -> Self {
        self.pat_pid = pid;
        self
    }

    pub fn with_pmt_pid(mut self, pid: u16) -> Self {
        self.pmt_pid = pid;
        self
    }

    pub fn with_video_pid(mut self, pid: u16) -> Self {
        self.video_pid = pid;
        self
    }

    pub fn with_audio_pid(mut self, pid: u16) -> Self {
        self.audio_pid = pid;
        self
    }

    pub fn with_segment_duration(mut self, seconds: f64) -> Self {
        self.segment_duration_secs = seconds;
        self
    }

    pub fn with_expected_medias(mut self, medias: ExpectedMedias) -> Self {
        self.expected_medias = medias;
        self
    }

    pub fn with_base_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.base_folder = Some(folder.into());
        self
    }

    pub fn with_segment_max_count(mut self, count: usize) -> Self {
        self.segment_max_count = count;
        self
    }

    pub fn with_pcr_interval(mut self, seconds: f64) -> Self {
        self.pcr_interval_secs = seconds;
        self
    }

    pub fn segment_duration_secs(&self) -> f64 {
        self.segment_duration_secs
    }

    pub fn base_folder(&self) -> Option<&PathBuf> {
        self.base_folder.as_ref()
    }
}
