//! Link recognition for the hosts the bot accepts.

/// Host fragments a submitted link must contain.
pub const SUPPORTED_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];

/// Cheap substring check run before anything touches yt-dlp.
pub fn is_supported_link(text: &str) -> bool {
    SUPPORTED_HOSTS.iter().any(|host| text.contains(host))
}

/// Bot commands start with `/`; they are never treated as links, even when
/// no command handler recognised them.
pub fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

/// Extracts the video id from a watch, short-link or Shorts URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    if let Some(pos) = url.find("v=") {
        let id = &url[pos + 2..];
        let id = id.split(['&', '#']).next().unwrap_or(id);
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    for marker in ["youtu.be/", "/shorts/", "/live/", "/embed/"] {
        if let Some(pos) = url.find(marker) {
            let id = &url[pos + marker.len()..];
            let id = id.split(['?', '&', '#', '/']).next().unwrap_or(id);
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }

    None
}
