//! Bounded in-memory map from short keys to full source links.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::links::extract_video_id;

/// Longest key handed out, so `k|<quality>|<key>` always fits in callback data.
pub const MAX_KEY_LEN: usize = 32;
const HASH_KEY_LEN: usize = 16;

pub struct LinkStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    links: HashMap<String, String>,
    order: VecDeque<String>,
}

impl LinkStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Stores `url` and returns the key it can be resolved with. Once full, the
    /// oldest entry is evicted.
    pub fn remember(&self, url: &str) -> String {
        let key = key_for(url);
        let mut inner = self.inner.lock();
        if inner.links.insert(key.clone(), url.to_owned()).is_none() {
            inner.order.push_back(key.clone());
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.links.remove(&oldest);
                }
            }
        }
        key
    }

    pub fn resolve(&self, key: &str) -> Option<String> {
        self.inner.lock().links.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Prefers the video id; falls back to a truncated blake3 digest of the link
/// when there is no usable id.
fn key_for(url: &str) -> String {
    match extract_video_id(url) {
        Some(id)
            if id.len() <= MAX_KEY_LEN
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            id
        }
        _ => blake3::hash(url.as_bytes()).to_hex()[..HASH_KEY_LEN].to_owned(),
    }
}
