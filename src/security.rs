#![forbid(unsafe_code)]

//! Process-level guard rails for the bot binary.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when the bot is started as root. The bot executes yt-dlp on
/// user-supplied links and writes into a shared download directory, so it is
/// expected to run under an unprivileged service account.
pub fn ensure_not_root(process: &str) -> Result<()> {
    if Uid::current().is_root() {
        bail!("{process} must not be run as root; start it under a dedicated service account");
    }
    Ok(())
}
