//! Quality choices and the callback data attached to selection buttons.
//!
//! Telegram caps callback data at 64 bytes. A button carries the full link
//! when it fits (`v|720|https://youtu.be/...`); otherwise the link is parked
//! in the [`LinkStore`] and the button carries its key (`k|720|dQw4w9WgXcQ`).

use std::fmt;

use crate::link_store::LinkStore;

/// Hard Telegram limit for `callback_data`, in bytes.
pub const CALLBACK_DATA_LIMIT: usize = 64;

const DIRECT_TAG: &str = "v";
const KEYED_TAG: &str = "k";
const BEST_TOKEN: &str = "best";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    /// Let yt-dlp pick the best format under the size bound.
    Best,
    /// Cap the vertical resolution, in pixels.
    Height(u32),
}

impl Quality {
    pub fn label(self) -> String {
        match self {
            Quality::Best => "best quality".to_owned(),
            Quality::Height(h) => format!("{h}p"),
        }
    }

    fn token(self) -> String {
        match self {
            Quality::Best => BEST_TOKEN.to_owned(),
            Quality::Height(h) => h.to_string(),
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        if token == BEST_TOKEN {
            return Some(Quality::Best);
        }
        match token.parse::<u32>() {
            Ok(h) if h > 0 => Some(Quality::Height(h)),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRef {
    Direct(String),
    Keyed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub quality: Quality,
    pub link: LinkRef,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed callback data: {0}")]
    Malformed(String),
    #[error("unknown quality in callback data: {0}")]
    UnknownQuality(String),
}

impl CallbackPayload {
    /// Builds the payload for `url`, falling back to a stored key when the
    /// direct form would not fit in [`CALLBACK_DATA_LIMIT`].
    pub fn for_link(quality: Quality, url: &str, store: &LinkStore) -> Self {
        let direct = Self {
            quality,
            link: LinkRef::Direct(url.to_owned()),
        };
        if direct.encode().len() <= CALLBACK_DATA_LIMIT {
            return direct;
        }
        Self {
            quality,
            link: LinkRef::Keyed(store.remember(url)),
        }
    }

    pub fn encode(&self) -> String {
        let (tag, value) = match &self.link {
            LinkRef::Direct(url) => (DIRECT_TAG, url.as_str()),
            LinkRef::Keyed(key) => (KEYED_TAG, key.as_str()),
        };
        format!("{tag}|{}|{value}", self.quality.token())
    }

    pub fn decode(data: &str) -> Result<Self, PayloadError> {
        let mut parts = data.splitn(3, '|');
        let (Some(tag), Some(quality), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(PayloadError::Malformed(data.to_owned()));
        };
        if value.is_empty() {
            return Err(PayloadError::Malformed(data.to_owned()));
        }
        let quality = Quality::from_token(quality)
            .ok_or_else(|| PayloadError::UnknownQuality(quality.to_owned()))?;
        let link = match tag {
            DIRECT_TAG => LinkRef::Direct(value.to_owned()),
            KEYED_TAG => LinkRef::Keyed(value.to_owned()),
            _ => return Err(PayloadError::Malformed(data.to_owned())),
        };
        Ok(Self { quality, link })
    }

    /// Resolves the original link, consulting `store` for keyed payloads.
    pub fn resolve(&self, store: &LinkStore) -> Option<String> {
        match &self.link {
            LinkRef::Direct(url) => Some(url.clone()),
            LinkRef::Keyed(key) => store.resolve(key),
        }
    }
}
