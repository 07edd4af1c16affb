use std::path::Path;

use id3::TagLike;

/// Tag triple used for folder grouping and song naming.
///
/// Fields are `None` when the frame is missing or holds only whitespace, so
/// callers can apply their own fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
}

/// Read the ID3 tags of an audio file.
///
/// A missing or unreadable tag is not an error, untagged files are planned
/// with filename fallbacks instead.
pub async fn read_tags(path: &Path) -> TrackTags {
    let tag = match id3::Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(err) => {
            tracing::debug!("no usable id3 tag in '{}': {}", path.display(), err);
            return TrackTags::default();
        }
    };
    TrackTags {
        artist: clean(tag.artist()),
        title: clean(tag.title()),
        album: clean(tag.album()),
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
