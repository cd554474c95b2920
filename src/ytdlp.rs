//! Thin async wrapper around the `yt-dlp` executable.
//!
//! Two invocations are used: a metadata-only probe that feeds the quality
//! keyboard, and a bounded download into a private work directory. The work
//! directory is a [`TempDir`], so the file disappears as soon as the
//! [`DownloadedVideo`] is cleaned up or dropped.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::bail;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::failure::ExtractError;
use crate::media::VideoInfo;
use crate::payload::Quality;

/// Intermediate artifacts yt-dlp may leave next to the final file.
const SCRATCH_EXTENSIONS: [&str; 5] = ["part", "ytdl", "json", "temp", "tmp"];

/// The extraction seam the handlers talk to.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Metadata-only call; nothing is written to disk.
    async fn probe(&self, url: &str) -> Result<VideoInfo, ExtractError>;

    /// Downloads `url` at `quality`, bounded by the upload limit.
    async fn download(&self, url: &str, quality: Quality) -> Result<DownloadedVideo, ExtractError>;
}

/// A finished download. Owns its work directory.
#[derive(Debug)]
pub struct DownloadedVideo {
    pub path: PathBuf,
    pub info: VideoInfo,
    workdir: TempDir,
}

impl DownloadedVideo {
    pub fn new(path: PathBuf, info: VideoInfo, workdir: TempDir) -> Self {
        Self {
            path,
            info,
            workdir,
        }
    }

    /// Whether the file should be sent as a playable video rather than a
    /// plain document.
    pub fn is_video(&self) -> bool {
        mime_guess::from_path(&self.path)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::VIDEO)
    }

    /// Removes the file together with its work directory.
    pub fn cleanup(self) -> std::io::Result<()> {
        self.workdir.close()
    }
}

/// Upload limits are configured in MiB.
pub fn upload_limit_bytes(max_upload_mb: u64) -> u64 {
    max_upload_mb.saturating_mul(1024 * 1024)
}

/// yt-dlp format selector bounded by resolution and upload size. The `?`
/// keeps formats whose size yt-dlp does not know; the post-download size check
/// catches those.
pub fn format_selector(quality: Quality, max_upload_mb: u64) -> String {
    let size = format!("[filesize<?{max_upload_mb}M]");
    match quality {
        Quality::Best => format!("best{size}/bestvideo{size}+bestaudio"),
        Quality::Height(h) => {
            format!("best[height<={h}]{size}/bestvideo[height<={h}]{size}+bestaudio")
        }
    }
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    download_root: PathBuf,
    max_upload_mb: u64,
    cookies: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(
        program: impl Into<PathBuf>,
        download_root: impl Into<PathBuf>,
        max_upload_mb: u64,
    ) -> Self {
        Self {
            program: program.into(),
            download_root: download_root.into(),
            max_upload_mb,
            cookies: None,
        }
    }

    pub fn with_cookies(mut self, cookies: Option<PathBuf>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.ytdlp_path.clone(),
            settings.download_dir.clone(),
            settings.max_upload_mb,
        )
        .with_cookies(settings.cookies_file.clone())
    }

    fn max_upload_bytes(&self) -> u64 {
        upload_limit_bytes(self.max_upload_mb)
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Runs `<program> --version` so a missing install fails at startup rather
    /// than on the first user request.
    pub async fn ensure_available(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
            }
            Ok(output) => bail!(
                "{} is installed but returned a failure status ({})",
                self.program_name(),
                output.status
            ),
            Err(err) => bail!(
                "{} is not installed or not in PATH: {}",
                self.program_name(),
                err
            ),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--no-progress")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(cookies) = &self.cookies
            && cookies.exists()
        {
            command.arg("--cookies").arg(cookies);
        }

        command
    }

    async fn run(&self, mut command: Command) -> Result<String, ExtractError> {
        let output = command
            .output()
            .await
            .map_err(|source| ExtractError::Launch {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Failed(failure_summary(&stderr, output.status)));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| ExtractError::Failed(format!("yt-dlp output is not UTF-8: {err}")))
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg(url);

        debug!(url, "probing metadata");
        let stdout = self.run(command).await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    async fn download(&self, url: &str, quality: Quality) -> Result<DownloadedVideo, ExtractError> {
        tokio::fs::create_dir_all(&self.download_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix("dl-")
            .tempdir_in(&self.download_root)?;
        let template = workdir.path().join("%(id)s.%(ext)s");
        let selector = format_selector(quality, self.max_upload_mb);

        let mut command = self.command();
        command
            .arg("--format")
            .arg(&selector)
            .arg("--max-filesize")
            .arg(format!("{}M", self.max_upload_mb))
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--output")
            .arg(&template)
            .arg("--dump-json")
            .arg("--no-simulate")
            .arg(url);

        debug!(url, %selector, workdir = %workdir.path().display(), "downloading");
        let stdout = self.run(command).await?;
        let info = parse_info_lines(&stdout)?;

        let path = find_media_file(workdir.path()).ok_or(ExtractError::MissingOutput)?;
        let size = tokio::fs::metadata(&path).await?.len();
        let limit = self.max_upload_bytes();
        if size > limit {
            return Err(ExtractError::TooLarge { size, limit });
        }

        Ok(DownloadedVideo::new(path, info, workdir))
    }
}

/// `--dump-json` prints one JSON document per line; the last one wins.
fn parse_info_lines(stdout: &str) -> Result<VideoInfo, ExtractError> {
    match stdout.lines().rev().find(|line| line.trim_start().starts_with('{')) {
        Some(line) => Ok(serde_json::from_str(line)?),
        None => Ok(VideoInfo::default()),
    }
}

/// Picks the largest non-scratch file in the work directory.
fn find_media_file(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            !entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SCRATCH_EXTENSIONS.contains(&ext))
        })
        .filter_map(|entry| {
            let size = entry.metadata().ok()?.len();
            Some((size, entry.into_path()))
        })
        .max_by_key(|(size, _)| *size)
        .map(|(_, path)| path)
}

/// Keeps yt-dlp's `ERROR:` lines, which carry the text the failure
/// classification looks at.
fn failure_summary(stderr: &str, status: ExitStatus) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{FailureKind, classify};
    use anyhow::Result;
    use std::fs;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    const STUB: &str = r#"#!/usr/bin/env bash
set -euo pipefail
prev=""
output=""
for arg in "$@"; do
    if [[ "$prev" == "--output" ]]; then
        output="$arg"
    fi
    prev="$arg"
done
if [[ " $* " == *" --version "* ]]; then
    echo "2024.01.01"
    exit 0
fi
if [[ " $* " == *"youtu.be/private"* ]]; then
    echo "WARNING: something harmless" >&2
    echo "ERROR: [youtube] alpha: Private video. Sign in if you've been granted access" >&2
    exit 1
fi
if [[ " $* " == *" --dump-single-json "* ]]; then
cat <<'JSON'
{
  "id": "alpha",
  "title": "Alpha Title",
  "thumbnail": "https://i.ytimg.com/vi/alpha/hq.jpg",
  "duration": 61,
  "view_count": 42,
  "uploader": "Channel",
  "formats": [
    { "format_id": "18", "height": 360, "vcodec": "avc1", "acodec": "mp4a" },
    { "format_id": "22", "height": 720, "vcodec": "avc1", "acodec": "mp4a" },
    { "format_id": "140", "vcodec": "none", "acodec": "mp4a" }
  ]
}
JSON
exit 0
fi
if [[ " $* " == *" --no-simulate "* ]]; then
    target=$(printf '%s' "$output" | sed -e 's/%(id)s/alpha/' -e 's/%(ext)s/mp4/')
    if [[ " $* " == *"youtu.be/huge"* ]]; then
        echo '{"id": "alpha", "title": "Alpha Title", "ext": "mp4"}'
        exit 0
    fi
    if [[ " $* " == *"youtu.be/big"* ]]; then
        head -c 2097152 /dev/zero > "$target"
    else
        printf 'video-bytes' > "$target"
    fi
    printf 'partial' > "${target}.part"
    echo '{"id": "alpha", "title": "Alpha Title", "ext": "mp4", "width": 1280, "height": 720, "duration": 61}'
    exit 0
fi
exit 0
"#;

    fn install_stub(dir: &Path) -> Result<PathBuf> {
        let script_path = dir.join("yt-dlp");
        fs::write(&script_path, STUB)?;
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&script_path)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms)?;
        }
        Ok(script_path)
    }

    fn stub_ytdlp() -> Result<(TempDir, YtDlp)> {
        let dir = tempdir()?;
        let stub = install_stub(dir.path())?;
        let ytdlp = YtDlp::new(stub, dir.path().join("downloads"), 1);
        Ok((dir, ytdlp))
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
    }

    #[test]
    fn selectors_bound_height_and_size() {
        assert_eq!(
            format_selector(Quality::Height(720), 50),
            "best[height<=720][filesize<?50M]/bestvideo[height<=720][filesize<?50M]+bestaudio"
        );
        assert_eq!(
            format_selector(Quality::Best, 20),
            "best[filesize<?20M]/bestvideo[filesize<?20M]+bestaudio"
        );
    }

    #[test]
    fn failure_summary_prefers_error_lines() {
        let status = std::process::Command::new("false").status().unwrap();
        assert_eq!(
            failure_summary("WARNING: a\nERROR: b\n", status),
            "ERROR: b"
        );
        assert_eq!(failure_summary("noise\nlast line\n\n", status), "last line");
        assert!(failure_summary("", status).starts_with("yt-dlp exited with"));
    }

    #[test]
    fn find_media_file_skips_scratch_files() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("alpha.mp4"), "v")?;
        fs::write(dir.path().join("alpha.mp4.part"), "much larger partial")?;
        fs::write(dir.path().join("alpha.info.json"), "{}")?;
        let found = find_media_file(dir.path()).unwrap();
        assert!(found.ends_with("alpha.mp4"));
        Ok(())
    }

    #[tokio::test]
    async fn reports_version() -> Result<()> {
        let (_dir, ytdlp) = stub_ytdlp()?;
        assert_eq!(ytdlp.ensure_available().await?, "2024.01.01");
        Ok(())
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let ytdlp = YtDlp::new("/nonexistent/yt-dlp", "/tmp", 50);
        assert!(ytdlp.ensure_available().await.is_err());
        let err = ytdlp.probe("https://youtu.be/alpha").await.unwrap_err();
        assert!(matches!(err, ExtractError::Launch { .. }));
    }

    #[tokio::test]
    async fn probe_reads_metadata() -> Result<()> {
        let (_dir, ytdlp) = stub_ytdlp()?;
        let info = ytdlp.probe("https://youtu.be/alpha").await?;
        assert_eq!(info.display_title(), "Alpha Title");
        assert_eq!(info.available_heights(u64::MAX), vec![720, 360]);
        assert_eq!(
            info.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/alpha/hq.jpg")
        );
        Ok(())
    }

    #[tokio::test]
    async fn probe_failure_keeps_error_line() -> Result<()> {
        let (_dir, ytdlp) = stub_ytdlp()?;
        let err = ytdlp
            .probe("https://youtu.be/private")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("ERROR:"));
        assert!(!message.contains("WARNING"));
        assert_eq!(classify(&message), FailureKind::Unavailable);
        Ok(())
    }

    #[tokio::test]
    async fn download_lands_in_private_workdir() -> Result<()> {
        let (dir, ytdlp) = stub_ytdlp()?;
        let video = ytdlp
            .download("https://youtu.be/alpha", Quality::Height(720))
            .await?;
        assert!(video.path.ends_with("alpha.mp4"));
        assert_eq!(fs::read_to_string(&video.path)?, "video-bytes");
        assert_eq!(video.info.height, Some(720));
        assert!(video.is_video());

        let path = video.path.clone();
        video.cleanup()?;
        assert!(!path.exists());
        assert_eq!(entries(&dir.path().join("downloads")), 0);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_download_is_removed() -> Result<()> {
        let (dir, ytdlp) = stub_ytdlp()?;
        let err = ytdlp
            .download("https://youtu.be/big", Quality::Best)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::TooLarge { .. }));
        assert_eq!(classify(&err.to_string()), FailureKind::TooLarge);
        assert_eq!(entries(&dir.path().join("downloads")), 0);
        Ok(())
    }

    #[tokio::test]
    async fn silent_skip_over_max_filesize_reads_as_too_large() -> Result<()> {
        let (dir, ytdlp) = stub_ytdlp()?;
        let err = ytdlp
            .download("https://youtu.be/huge", Quality::Best)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingOutput));
        assert_eq!(classify(&err.to_string()), FailureKind::TooLarge);
        assert_eq!(entries(&dir.path().join("downloads")), 0);
        Ok(())
    }
}
