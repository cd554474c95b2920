//! Errors raised at the extraction seam and their user-facing categories.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Failed(String),
    #[error("could not parse yt-dlp output: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// yt-dlp exits cleanly without writing anything when every candidate
    /// format is over `--max-filesize`.
    #[error("yt-dlp wrote no media file: the video exceeds the max filesize")]
    MissingOutput,
    #[error("file is too large: {size} bytes exceeds the {limit} byte upload limit")]
    TooLarge { size: u64, limit: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The three reply variants a failure can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    TooLarge,
    Unavailable,
    Other,
}

/// Classifies a stringified failure. Size problems win over availability
/// problems when both substrings appear.
pub fn classify(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("too large") || lower.contains("filesize") {
        FailureKind::TooLarge
    } else if lower.contains("private") || lower.contains("unavailable") {
        FailureKind::Unavailable
    } else {
        FailureKind::Other
    }
}
