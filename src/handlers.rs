//! The four update handlers: `/start`, `/help`, a pasted link, and a quality
//! button press.
//!
//! Extraction failures never bubble up to the dispatcher; they are classified
//! and turned into a reply on the status message. Transport errors do bubble
//! up, since there is nobody left to tell.

use anyhow::Result;
use tracing::{info, warn};

use crate::failure::classify;
use crate::link_store::LinkStore;
use crate::links::is_supported_link;
use crate::media::VideoInfo;
use crate::outbox::{Button, Keyboard, Outbox, SentMessage};
use crate::payload::{CallbackPayload, Quality};
use crate::texts::{
    self, BEST_QUALITY_LABEL, FETCHING_INFO, NOT_A_LINK, SELECTION_EXPIRED, UPLOADING,
};
use crate::ytdlp::{Extractor, upload_limit_bytes};

const BUTTONS_PER_ROW: usize = 3;

pub struct Handlers<E> {
    extractor: E,
    links: LinkStore,
    max_upload_mb: u64,
}

impl<E: Extractor> Handlers<E> {
    pub fn new(extractor: E, links: LinkStore, max_upload_mb: u64) -> Self {
        Self {
            extractor,
            links,
            max_upload_mb,
        }
    }

    pub async fn start<O: Outbox + ?Sized>(&self, outbox: &O) -> Result<()> {
        outbox.send_text(&texts::start(self.max_upload_mb)).await?;
        Ok(())
    }

    pub async fn help<O: Outbox + ?Sized>(&self, outbox: &O) -> Result<()> {
        outbox.send_text(&texts::help()).await?;
        Ok(())
    }

    /// Validates the link, probes its metadata and offers the quality buttons.
    pub async fn link<O: Outbox + ?Sized>(&self, outbox: &O, text: &str) -> Result<()> {
        let url = text.trim();
        if !is_supported_link(url) {
            outbox.send_text(NOT_A_LINK).await?;
            return Ok(());
        }

        info!(url, "accepted link");
        let status = outbox.send_text(FETCHING_INFO).await?;

        let info = match self.extractor.probe(url).await {
            Ok(info) => info,
            Err(err) => return self.report_failure(outbox, status, &err.to_string()).await,
        };

        let heights = info.available_heights(upload_limit_bytes(self.max_upload_mb));
        let keyboard = self.quality_keyboard(&heights, url);
        self.send_card(outbox, &info, &keyboard).await?;

        if let Err(err) = outbox.delete(status).await {
            warn!(error = %format!("{err:#}"), "could not delete status message");
        }
        Ok(())
    }

    /// Downloads the chosen quality and forwards the file. The download is
    /// removed whether or not the upload went through.
    pub async fn selection<O: Outbox + ?Sized>(&self, outbox: &O, data: &str) -> Result<()> {
        let payload = match CallbackPayload::decode(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "rejected callback data");
                outbox.send_text(SELECTION_EXPIRED).await?;
                return Ok(());
            }
        };
        let Some(url) = payload.resolve(&self.links) else {
            warn!(data, "callback refers to a forgotten link");
            outbox.send_text(SELECTION_EXPIRED).await?;
            return Ok(());
        };

        info!(url = %url, quality = %payload.quality, "starting download");
        let status = outbox
            .send_text(&texts::downloading(payload.quality))
            .await?;

        let video = match self.extractor.download(&url, payload.quality).await {
            Ok(video) => video,
            Err(err) => return self.report_failure(outbox, status, &err.to_string()).await,
        };

        if let Err(err) = outbox.edit_text(status, UPLOADING).await {
            warn!(error = %format!("{err:#}"), "could not update status message");
        }

        let caption = texts::video_caption(video.info.display_title());
        let sent = if video.is_video() {
            outbox.send_video(&video, &caption).await
        } else {
            outbox.send_document(&video.path, &caption).await
        };

        let path = video.path.clone();
        if let Err(err) = video.cleanup() {
            warn!(path = %path.display(), error = %err, "could not remove download");
        }

        match sent {
            Ok(()) => {
                info!(url = %url, title = %caption, "video sent");
                if let Err(err) = outbox.delete(status).await {
                    warn!(error = %format!("{err:#}"), "could not delete status message");
                }
                Ok(())
            }
            Err(err) => self.report_failure(outbox, status, &format!("{err:#}")).await,
        }
    }

    /// One button per resolution, then the automatic option on its own row.
    pub fn quality_keyboard(&self, heights: &[u32], url: &str) -> Keyboard {
        let mut rows: Vec<Vec<Button>> = heights
            .chunks(BUTTONS_PER_ROW)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|height| {
                        self.button(format!("📹 {height}p"), Quality::Height(*height), url)
                    })
                    .collect()
            })
            .collect();
        rows.push(vec![self.button(BEST_QUALITY_LABEL.to_owned(), Quality::Best, url)]);
        Keyboard { rows }
    }

    fn button(&self, label: String, quality: Quality, url: &str) -> Button {
        Button {
            label,
            data: CallbackPayload::for_link(quality, url, &self.links).encode(),
        }
    }

    /// Thumbnail card when possible, plain text otherwise.
    async fn send_card<O: Outbox + ?Sized>(
        &self,
        outbox: &O,
        info: &VideoInfo,
        keyboard: &Keyboard,
    ) -> Result<()> {
        let caption = info.card_caption();
        if let Some(thumbnail) = info.thumbnail.as_deref() {
            match outbox.send_photo(thumbnail, &caption, keyboard).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "thumbnail card failed, sending text");
                }
            }
        }
        outbox.send_text_with_keyboard(&caption, keyboard).await?;
        Ok(())
    }

    async fn report_failure<O: Outbox + ?Sized>(
        &self,
        outbox: &O,
        status: SentMessage,
        message: &str,
    ) -> Result<()> {
        let kind = classify(message);
        warn!(?kind, error = %message, "request failed");
        outbox
            .edit_text(status, &texts::failure(kind, message, self.max_upload_mb))
            .await
    }
}
