//! Outbound side of a single chat.
//!
//! Handlers talk to [`Outbox`] instead of `teloxide::Bot` directly so the
//! routing logic can be exercised without the network. [`TelegramOutbox`] is
//! the real implementation, bound to one chat id.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use url::Url;

use crate::ytdlp::DownloadedVideo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

/// Inline keyboard, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    fn to_markup(&self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(self.rows.iter().map(|row| {
            row.iter()
                .map(|button| {
                    InlineKeyboardButton::callback(button.label.clone(), button.data.clone())
                })
                .collect::<Vec<_>>()
        }))
    }
}

/// Handle to a message the bot sent, used for later edits and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage(pub i32);

#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<SentMessage>;
    async fn send_text_with_keyboard(
        &self,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<SentMessage>;
    async fn send_photo(
        &self,
        url: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<SentMessage>;
    async fn edit_text(&self, message: SentMessage, text: &str) -> Result<()>;
    async fn delete(&self, message: SentMessage) -> Result<()>;
    async fn send_video(&self, video: &DownloadedVideo, caption: &str) -> Result<()>;
    async fn send_document(&self, path: &Path, caption: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramOutbox {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramOutbox {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn send_text(&self, text: &str) -> Result<SentMessage> {
        let message = self
            .bot
            .send_message(self.chat_id, text)
            .await
            .context("sending text message")?;
        Ok(SentMessage(message.id.0))
    }

    async fn send_text_with_keyboard(
        &self,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<SentMessage> {
        let message = self
            .bot
            .send_message(self.chat_id, text)
            .reply_markup(keyboard.to_markup())
            .await
            .context("sending quality keyboard")?;
        Ok(SentMessage(message.id.0))
    }

    async fn send_photo(
        &self,
        url: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<SentMessage> {
        let url = Url::parse(url).with_context(|| format!("parsing thumbnail URL {url}"))?;
        let message = self
            .bot
            .send_photo(self.chat_id, InputFile::url(url))
            .caption(caption)
            .reply_markup(keyboard.to_markup())
            .await
            .context("sending thumbnail card")?;
        Ok(SentMessage(message.id.0))
    }

    async fn edit_text(&self, message: SentMessage, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(self.chat_id, MessageId(message.0), text)
            .await
            .context("editing status message")?;
        Ok(())
    }

    async fn delete(&self, message: SentMessage) -> Result<()> {
        self.bot
            .delete_message(self.chat_id, MessageId(message.0))
            .await
            .context("deleting status message")?;
        Ok(())
    }

    async fn send_video(&self, video: &DownloadedVideo, caption: &str) -> Result<()> {
        let mut request = self
            .bot
            .send_video(self.chat_id, InputFile::file(video.path.clone()))
            .caption(caption)
            .supports_streaming(true);
        if let Some(duration) = video.info.duration_secs() {
            request = request.duration(duration);
        }
        if let (Some(width), Some(height)) = (video.info.width, video.info.height) {
            request = request.width(width).height(height);
        }
        request.await.context("uploading video")?;
        Ok(())
    }

    async fn send_document(&self, path: &Path, caption: &str) -> Result<()> {
        self.bot
            .send_document(self.chat_id, InputFile::file(path.to_path_buf()))
            .caption(caption)
            .await
            .context("uploading document")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_keeps_row_layout() {
        let keyboard = Keyboard {
            rows: vec![
                vec![
                    Button {
                        label: "720p".into(),
                        data: "v|720|u".into(),
                    },
                    Button {
                        label: "360p".into(),
                        data: "v|360|u".into(),
                    },
                ],
                vec![Button {
                    label: "best".into(),
                    data: "v|best|u".into(),
                }],
            ],
        };
        let markup = keyboard.to_markup();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[0][0].text, "720p");
        assert_eq!(keyboard.buttons().count(), 3);
    }
}
