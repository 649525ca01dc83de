//! Observer interface for muxer/segment-writer events, per §4.7 and §9
//! ("use a trait object / virtual interface, not a weak pointer").

use crate::error::WriterErrorKind;

/// Receives muxer and segment-writer events. All methods default to a no-op
/// so implementers only override what they need, mirroring the optional
/// callback fields on `FlvWriterTask`.
pub trait MuxerDelegate: Send {
    /// Raw TS bytes produced for the current write, regardless of segmentation.
    fn did_output(&mut self, _bytes: &[u8]) {}

    /// A segment rotation occurred at this 90kHz timestamp.
    fn did_rotate(&mut self, _timestamp: u64) {}

    /// A `.ts` segment file was finalized at this path.
    fn did_generate_ts(&mut self, _path: &std::path::Path) {}

    /// The `.m3u8` playlist was rewritten at this path.
    fn did_generate_m3u8(&mut self, _path: &std::path::Path) {}

    /// A recoverable I/O failure occurred; streaming continues.
    fn writer_error(&mut self, _kind: WriterErrorKind, _message: &str) {}
}

/// A delegate that observes nothing; used when no implementer is supplied.
#[derive(Debug, Default)]
pub struct NullDelegate;

impl MuxerDelegate for NullDelegate {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingDelegate {
        rotations: Vec<u64>,
        generated_ts: Vec<PathBuf>,
        errors: Vec<WriterErrorKind>,
    }

    impl MuxerDelegate for RecordingDelegate {
        fn did_rotate(&mut self, timestamp: u64) {
            self.rotations.push(timestamp);
        }
        fn did_generate_ts(&mut self, path: &std::path::Path) {
            self.generated_ts.push(path.to_path_buf());
        }
        fn writer_error(&mut self, kind: WriterErrorKind, _message: &str) {
            self.errors.push(kind);
        }
    }

    #[test]
    fn null_delegate_ignores_all_events() {
        let mut delegate = NullDelegate;
        delegate.did_output(b"abc");
        delegate.did_rotate(90_000);
        delegate.writer_error(WriterErrorKind::Write, "boom");
    }

    #[test]
    fn recording_delegate_captures_events() {
        let delegate = Arc::new(Mutex::new(RecordingDelegate::default()));
        delegate.lock().unwrap().did_rotate(180_000);
        delegate
            .lock()
            .unwrap()
            .did_generate_ts(std::path::Path::new("part00000.ts"));
        delegate
            .lock()
            .unwrap()
            .writer_error(WriterErrorKind::SyncAndClose, "fsync failed");

        let inner = delegate.lock().unwrap();
        assert_eq!(inner.rotations, vec![180_000]);
        assert_eq!(inner.generated_ts, vec![PathBuf::from("part00000.ts")]);
        assert_eq!(inner.errors, vec![WriterErrorKind::SyncAndClose]);
    }
}
