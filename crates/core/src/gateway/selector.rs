//! Playable file selection and media types.

use std::path::Path;

use crate::config::ContentTypeMode;
use crate::engine::ContentFile;

/// Extensions a browser video element is expected to play, lowercase.
pub const PLAYABLE_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm"];

const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether `name` has a playable extension (case-insensitive).
pub fn is_playable(name: &str) -> bool {
    extension(name).is_some_and(|ext| PLAYABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// First playable file in content order, with its index.
pub fn select_playable(files: &[ContentFile]) -> Option<(usize, &ContentFile)> {
    files.iter().enumerate().find(|(_, f)| is_playable(&f.name))
}

/// `Content-Type` for a streamed file.
pub fn content_type_for(name: &str, mode: ContentTypeMode) -> &'static str {
    match mode {
        ContentTypeMode::Fixed => DEFAULT_CONTENT_TYPE,
        ContentTypeMode::ByExtension => match extension(name).as_deref() {
            Some("mkv") => "video/x-matroska",
            Some("avi") => "video/x-msvideo",
            Some("webm") => "video/webm",
            _ => DEFAULT_CONTENT_TYPE,
        },
    }
}
