//! Subset of yt-dlp's `--dump-single-json` payload the bot reads, plus the
//! helpers that turn it into the info card shown before quality selection.
//!
//! Every field is optional because yt-dlp omits keys freely depending on the
//! extractor and on how old the upload is.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::texts::{self, CHOOSE_QUALITY};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub fulltitle: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub upload_date: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatInfo {
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
}

impl FormatInfo {
    fn has_video(&self) -> bool {
        !self
            .vcodec
            .as_deref()
            .is_some_and(|codec| codec.eq_ignore_ascii_case("none"))
    }

    /// Exact size when known, yt-dlp's estimate otherwise.
    fn known_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    fn fits(&self, limit_bytes: u64) -> bool {
        self.known_size().is_none_or(|size| size <= limit_bytes)
    }
}

impl VideoInfo {
    pub fn display_title(&self) -> &str {
        self.fulltitle
            .as_deref()
            .or(self.title.as_deref())
            .filter(|t| !t.is_empty())
            .unwrap_or("Video")
    }

    pub fn author(&self) -> Option<&str> {
        self.uploader
            .as_deref()
            .or(self.channel.as_deref())
            .filter(|a| !a.is_empty())
    }

    /// Whole seconds, when yt-dlp reported a duration.
    pub fn duration_secs(&self) -> Option<u32> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u32)
    }

    /// Distinct heights of formats that carry a video stream, highest first.
    /// A height is dropped when every format at it is known to be larger
    /// than `limit_bytes`.
    pub fn available_heights(&self, limit_bytes: u64) -> Vec<u32> {
        let heights: BTreeSet<u32> = self
            .formats
            .iter()
            .filter(|format| format.has_video() && format.fits(limit_bytes))
            .filter_map(|format| format.height)
            .filter(|height| *height > 0)
            .collect();
        heights.into_iter().rev().collect()
    }

    /// Caption of the info card sent before the quality buttons.
    pub fn card_caption(&self) -> String {
        let mut lines = vec![format!(
            "🎬 {}",
            texts::truncate_chars(self.display_title(), texts::TITLE_LIMIT)
        )];
        if let Some(author) = self.author() {
            lines.push(format!("👤 {author}"));
        }
        if let Some(duration) = self.duration_secs() {
            lines.push(format!("⏱ {}", format_duration(duration)));
        }
        if let Some(views) = self.view_count {
            lines.push(format!("👁 {} views", group_thousands(views)));
        }
        if let Some(date) = self.upload_date.as_deref().and_then(format_upload_date) {
            lines.push(format!("📅 {date}"));
        }
        lines.push(String::new());
        lines.push(CHOOSE_QUALITY.to_owned());
        lines.join("\n")
    }
}

/// Renders durations as `H:MM:SS` or `M:SS` for short clips.
pub fn format_duration(duration: u32) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Converts yt-dlp's `YYYYMMDD` upload date into `YYYY-MM-DD`.
pub fn format_upload_date(value: &str) -> Option<String> {
    if value.len() != 8 {
        return None;
    }
    let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
