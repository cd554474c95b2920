//! Canned texts the bot sends to users.

use crate::failure::FailureKind;
use crate::payload::Quality;

/// Longest title used in a video caption.
pub const TITLE_LIMIT: usize = 200;
/// Longest slice of a raw error shown to the user.
pub const ERROR_DETAIL_LIMIT: usize = 200;

pub const NOT_A_LINK: &str = "❌ This does not look like a YouTube link!\n\n\
Please send a valid link.";
pub const FETCHING_INFO: &str = "🔍 Fetching video info...";
pub const CHOOSE_QUALITY: &str = "Choose the quality:";
pub const UPLOADING: &str = "📤 Sending the video...";
pub const SELECTION_EXPIRED: &str = "⌛ This selection has expired.\n\n\
Please send the link again.";
pub const BEST_QUALITY_LABEL: &str = "⭐ Best quality";

pub fn start(max_upload_mb: u64) -> String {
    format!(
        "👋 Hi! I download YouTube videos.\n\n\
Just send me a link to a video, pick a quality and I will send the file back.\n\n\
⚠️ Limit: the video must be smaller than {max_upload_mb}MB because of Telegram upload limits."
    )
}

pub fn help() -> String {
    "📖 How to use:\n\n\
1. Copy a YouTube video link\n\
2. Send me the link\n\
3. Pick a quality\n\
4. Wait while I download it and get your video!\n\n\
Supported link formats:\n\
• https://youtube.com/watch?v=...\n\
• https://youtu.be/..."
        .to_string()
}

pub fn downloading(quality: Quality) -> String {
    format!("⏳ Downloading video ({})...", quality.label())
}

pub fn failure(kind: FailureKind, detail: &str, max_upload_mb: u64) -> String {
    match kind {
        FailureKind::TooLarge => format!(
            "❌ The video is too large!\n\n\
Telegram limits uploads to {max_upload_mb}MB. Try a lower quality."
        ),
        FailureKind::Unavailable => "❌ The video is unavailable!\n\n\
It may be private or it has been removed."
            .to_string(),
        FailureKind::Other => format!(
            "❌ Something went wrong while downloading:\n\n{}",
            truncate_chars(detail, ERROR_DETAIL_LIMIT)
        ),
    }
}

pub fn video_caption(title: &str) -> String {
    format!("🎬 {}", truncate_chars(title, TITLE_LIMIT))
}

/// Truncates on a character boundary so multi-byte titles never split.
pub fn truncate_chars(value: &str, limit: usize) -> &str {
    match value.char_indices().nth(limit) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
