//! Segment file writer and sliding-window HLS playlist manager, per §4.6.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use m3u8_rs::MediaSegment;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::MuxerConfig;
use crate::delegate::MuxerDelegate;
use crate::error::{MuxError, Result, WriterErrorKind};

const PLAYLIST_FILENAME: &str = "ScreenRecording.m3u8";

fn make_entry(filename: String, duration_secs: f64, is_discontinuous: bool) -> MediaSegment {
    MediaSegment {
        uri: filename,
        duration: duration_secs as f32,
        discontinuity: is_discontinuous,
        ..Default::default()
    }
}

/// Writes TS bytes to rotating segment files and maintains `ScreenRecording.m3u8`.
pub struct SegmentWriter {
    base_folder: PathBuf,
    segment_duration_ticks: u64,
    segment_max_count: usize,

    sequence: u64,
    files: VecDeque<MediaSegment>,

    current_file: Option<File>,
    current_filename: String,
    rotated_timestamp: Option<u64>,
    is_discontinuity: bool,

    is_rotating: Mutex<bool>,
}

impl SegmentWriter {
    pub fn new(config: &MuxerConfig) -> Result<Self> {
        let base_folder = config
            .base_folder()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&base_folder)
            .map_err(|e| MuxError::writer(WriterErrorKind::TempDirectory, e))?;

        Ok(SegmentWriter {
            base_folder,
            segment_duration_ticks: (config.segment_duration_secs() * 90_000.0) as u64,
            segment_max_count: config.segment_max_count,
            sequence: 0,
            files: VecDeque::new(),
            current_file: None,
            current_filename: String::new(),
            rotated_timestamp: None,
            is_discontinuity: false,
            is_rotating: Mutex::new(false),
        })
    }

    fn segment_filename(sequence: u64) -> String {
        format!("part{sequence:05}.ts")
    }

    /// Open the first segment file. Must be called once before any `write`.
    pub fn begin(&mut self, timestamp: u64, delegate: &mut dyn MuxerDelegate) -> Result<()> {
        self.open_segment(timestamp, delegate)
    }

    fn open_segment(&mut self, timestamp: u64, _delegate: &mut dyn MuxerDelegate) -> Result<()> {
        let filename = Self::segment_filename(self.sequence);
        let path = self.base_folder.join(&filename);
        let file = File::create(&path).map_err(|e| MuxError::writer(WriterErrorKind::Write, e))?;
        info!(segment = %filename, path = %path.display(), "Opening segment");
        self.current_file = Some(file);
        self.current_filename = filename;
        self.rotated_timestamp = Some(timestamp);
        self.sequence += 1;
        Ok(())
    }

    /// Write raw TS bytes to the current segment file.
    pub fn write(&mut self, bytes: &[u8], delegate: &mut dyn MuxerDelegate) -> Result<()> {
        let result = match &mut self.current_file {
            Some(file) => file.write_all(bytes),
            None => return Err(MuxError::NotRunning),
        };
        match result {
            Ok(()) => {
                delegate.did_output(bytes);
                Ok(())
            }
            Err(e) => {
                warn!(segment = %self.current_filename, error = %e, "Write failed, marking next segment discontinuous");
                delegate.writer_error(WriterErrorKind::Write, &e.to_string());
                self.is_discontinuity = true;
                Err(MuxError::writer(WriterErrorKind::Write, e))
            }
        }
    }

    /// Whether a rotation should occur before writing the next sample.
    ///
    /// Rotation only happens on a random-access boundary (§3 invariant): a
    /// non-keyframe sample never triggers it, even once the duration
    /// threshold has elapsed.
    pub fn should_rotate(&self, timestamp: u64, random_access: bool) -> bool {
        if !random_access {
            return false;
        }
        match self.rotated_timestamp {
            Some(start) => timestamp.saturating_sub(start) > self.segment_duration_ticks,
            None => false,
        }
    }

    /// Perform a rotation: close the current file, record its entry, rewrite
    /// the playlist, prune overflow, and open the next segment file.
    ///
    /// If a rotation is already in flight (re-entrant call from the same
    /// thread, which should not happen in normal operation) the call is a
    /// no-op, per §5's "discard subsequent rotation triggers" rule.
    pub fn rotate(&mut self, timestamp: u64, delegate: &mut dyn MuxerDelegate) -> Result<()> {
        {
            let mut rotating = self.is_rotating.lock();
            if *rotating {
                return Ok(());
            }
            *rotating = true;
        }

        let result = self.rotate_inner(timestamp, delegate);
        *self.is_rotating.lock() = false;
        result
    }

    fn rotate_inner(&mut self, timestamp: u64, delegate: &mut dyn MuxerDelegate) -> Result<()> {
        let duration_secs = match self.rotated_timestamp {
            Some(start) => timestamp.saturating_sub(start) as f64 / 90_000.0,
            None => 0.0,
        };
        debug!(segment = %self.current_filename, duration_secs, "Rotating segment");

        self.close_current(delegate);

        self.files.push_back(make_entry(
            self.current_filename.clone(),
            duration_secs,
            self.is_discontinuity,
        ));
        self.is_discontinuity = false;

        self.prune_overflow(delegate)?;
        self.write_playlist(delegate)?;

        delegate.did_rotate(timestamp);
        self.open_segment(timestamp, delegate)?;
        Ok(())
    }

    /// Sync and drop the current file handle. A sync failure is reported to
    /// the delegate but does not abort the rotation: per §7, the next
    /// segment is still opened.
    fn close_current(&mut self, delegate: &mut dyn MuxerDelegate) {
        if let Some(file) = self.current_file.take() {
            if let Err(e) = file.sync_all() {
                warn!(segment = %self.current_filename, error = %e, "fsync failed while closing segment");
                delegate.writer_error(WriterErrorKind::SyncAndClose, &e.to_string());
            }
            delegate.did_generate_ts(Path::new(&self.current_filename));
        }
    }

    fn prune_overflow(&mut self, delegate: &mut dyn MuxerDelegate) -> Result<()> {
        while self.files.len() > self.segment_max_count {
            if let Some(oldest) = self.files.pop_front() {
                let path = self.base_folder.join(&oldest.uri);
                debug!(path = %path.display(), "Pruning oldest segment");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove pruned segment");
                    delegate.writer_error(WriterErrorKind::RemoveItem, &e.to_string());
                }
            }
        }
        Ok(())
    }

    fn media_sequence_start(&self) -> u64 {
        self.sequence.saturating_sub(self.files.len() as u64)
    }

    fn target_duration(&self) -> u64 {
        let segment_ceiling = (self.segment_duration_ticks as f64 / 90_000.0).ceil() as u64;
        let entries_ceiling = self
            .files
            .iter()
            .map(|e| (e.duration as f64).ceil() as u64)
            .max()
            .unwrap_or(0);
        segment_ceiling.max(entries_ceiling).max(1)
    }

    fn playlist_text(&self) -> String {
        let mut out = String::new();
        out.push_str("#EXTM3U\r\n");
        out.push_str("#EXT-X-VERSION:3\r\n");
        out.push_str(&format!(
            "#EXT-X-MEDIA-SEQUENCE:{}\r\n",
            self.media_sequence_start()
        ));
        out.push_str(&format!(
            "#EXT-X-TARGETDURATION:{}\r\n",
            self.target_duration()
        ));
        for entry in &self.files {
            if entry.discontinuity {
                out.push_str("#EXT-X-DISCONTINUITY\r\n");
            }
            out.push_str(&format!("#EXTINF:{:.3},\r\n", entry.duration));
            out.push_str(&entry.uri);
            out.push_str("\r\n");
        }
        out
    }

    fn write_playlist(&mut self, delegate: &mut dyn MuxerDelegate) -> Result<()> {
        let path = self.base_folder.join(PLAYLIST_FILENAME);
        let text = self.playlist_text();
        fs::write(&path, text).map_err(|e| MuxError::writer(WriterErrorKind::WriteToUrl, e))?;
        debug!(path = %path.display(), entries = self.files.len(), "Playlist rewritten");
        delegate.did_generate_m3u8(&path);
        Ok(())
    }

    /// Finalize the current file and playlist. Idempotent: a second call
    /// after the writer is already stopped is a no-op.
    pub fn stop(&mut self, timestamp: u64, delegate: &mut dyn MuxerDelegate) -> Result<()> {
        if self.current_file.is_none() {
            return Ok(());
        }
        info!("Stopping segment writer, finalizing last segment");
        let duration_secs = match self.rotated_timestamp {
            Some(start) => timestamp.saturating_sub(start) as f64 / 90_000.0,
            None => 0.0,
        };
        self.close_current(delegate);
        self.files.push_back(make_entry(
            self.current_filename.clone(),
            duration_secs,
            self.is_discontinuity,
        ));
        self.is_discontinuity = false;
        self.prune_overflow(delegate)?;
        self.write_playlist(delegate)?;
        Ok(())
    }

    pub fn files(&self) -> &VecDeque<MediaSegment> {
        &self.files
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn mark_discontinuity(&mut self) {
        self.is_discontinuity = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::NullDelegate;

    fn writer_in(dir: &tempfile::TempDir) -> SegmentWriter {
        let config = MuxerConfig::new()
            .with_base_folder(dir.path())
            .with_segment_duration(2.0);
        SegmentWriter::new(&config).unwrap()
    }

    #[test]
    fn begin_creates_part_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let mut delegate = NullDelegate;
        writer.begin(0, &mut delegate).unwrap();
        assert!(dir.path().join("part00000.ts").exists());
    }

    #[test]
    fn should_rotate_requires_random_access_and_elapsed_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let mut delegate = NullDelegate;
        writer.begin(0, &mut delegate).unwrap();

        assert!(!writer.should_rotate(90_000, true)); // 1s elapsed, threshold 2s
        assert!(!writer.should_rotate(3 * 90_000, false)); // elapsed but not IDR
        assert!(writer.should_rotate(3 * 90_000, true)); // elapsed and IDR
    }

    #[test]
    fn rotate_appends_entry_and_writes_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let mut delegate = NullDelegate;
        writer.begin(0, &mut delegate).unwrap();
        writer.write(b"fake-ts-bytes", &mut delegate).unwrap();
        writer.rotate(3 * 90_000, &mut delegate).unwrap();

        assert_eq!(writer.files().len(), 1);
        assert!(dir.path().join("part00001.ts").exists());
        let playlist = fs::read_to_string(dir.path().join(PLAYLIST_FILENAME)).unwrap();
        assert!(playlist.starts_with("#EXTM3U\r\n"));
        assert!(playlist.contains("part00000.ts"));
        assert!(playlist.contains("#EXT-X-MEDIA-SEQUENCE:0"));
    }

    #[test]
    fn overflow_prunes_oldest_segment_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = MuxerConfig::new()
            .with_base_folder(dir.path())
            .with_segment_duration(1.0)
            .with_segment_max_count(2);
        let mut writer = SegmentWriter::new(&config).unwrap();
        let mut delegate = NullDelegate;
        writer.begin(0, &mut delegate).unwrap();

        for i in 1..=4u64 {
            writer.rotate(i * 2 * 90_000, &mut delegate).unwrap();
        }

        assert_eq!(writer.files().len(), 2);
        assert!(!dir.path().join("part00000.ts").exists());
        assert!(!dir.path().join("part00001.ts").exists());
        assert!(dir.path().join("part00002.ts").exists());
        assert!(dir.path().join("part00003.ts").exists());

        let playlist = fs::read_to_string(dir.path().join(PLAYLIST_FILENAME)).unwrap();
        assert!(playlist.contains("#EXT-X-MEDIA-SEQUENCE:2"));
    }

    #[test]
    fn discontinuity_flag_emits_tag_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let mut delegate = NullDelegate;
        writer.begin(0, &mut delegate).unwrap();
        writer.mark_discontinuity();
        writer.rotate(3 * 90_000, &mut delegate).unwrap();
        writer.rotate(6 * 90_000, &mut delegate).unwrap();

        let playlist = fs::read_to_string(dir.path().join(PLAYLIST_FILENAME)).unwrap();
        assert_eq!(playlist.matches("#EXT-X-DISCONTINUITY").count(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let mut delegate = NullDelegate;
        writer.begin(0, &mut delegate).unwrap();
        writer.stop(90_000, &mut delegate).unwrap();
        assert_eq!(writer.files().len(), 1);
        writer.stop(90_000, &mut delegate).unwrap();
        assert_eq!(writer.files().len(), 1, "second stop must be a no-op");
    }
}
