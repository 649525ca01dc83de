use std::io;
use thiserror::Error;

/// The kind of I/O failure a [`crate::delegate::MuxerDelegate::writer_error`] callback
/// reports. Mirrors the fixed failure taxonomy a live segment writer can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterErrorKind {
    TempDirectory,
    RemoveItem,
    Write,
    WriteToUrl,
    SyncAndClose,
}

impl std::fmt::Display for WriterErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriterErrorKind::TempDirectory => "tempDirectory",
            WriterErrorKind::RemoveItem => "removeItem",
            WriterErrorKind::Write => "write",
            WriterErrorKind::WriteToUrl => "writeToUrl",
            WriterErrorKind::SyncAndClose => "syncAndClose",
        };
        f.write_str(s)
    }
}

/// Errors produced by the muxer engine and segment writer.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("audio codec not configured: call on_audio_config before writing audio samples")]
    AudioConfigMissing,
    #[error("video codec not configured: call on_video_config before writing video samples")]
    VideoConfigMissing,
    #[error("muxer is not running")]
    NotRunning,
    #[error("{kind}: {source}")]
    Writer {
        kind: WriterErrorKind,
        #[source]
        source: io::Error,
    },
    #[error("TS encode error: {0}")]
    Ts(#[from] ts::TsError),
}

impl MuxError {
    pub fn writer(kind: WriterErrorKind, source: io::Error) -> Self {
        MuxError::Writer { kind, source }
    }

    /// The writer error kind, if this is a writer-category error.
    pub fn writer_kind(&self) -> Option<WriterErrorKind> {
        match self {
            MuxError::Writer { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
