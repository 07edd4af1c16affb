use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::metadata::TrackTags;

/// Upper bound on `_2`, `_3`, ... suffix probes for one candidate name.
pub const MAX_NAME_PROBES: usize = 1000;

const FALLBACK: &str = "unknown";

/// How song folders are grouped under the output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode {
    /// Reuse the name of the directory the source file sits in.
    Folder,
    /// No per-album folder, songs go straight under the output root.
    None,
    /// One folder per artist.
    Artist,
    /// One folder per "artist - album" pair.
    ArtistAlbum,
}

impl FromStr for NamingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "folder" => Ok(Self::Folder),
            "none" => Ok(Self::None),
            "artist" => Ok(Self::Artist),
            "artistAlbum" => Ok(Self::ArtistAlbum),
            other => Err(Error::Config(format!(
                "unknown naming mode '{other}', expected folder, none, artist or artistAlbum"
            ))),
        }
    }
}

/// Turn an arbitrary tag value into a safe cross-platform file name.
///
/// Non-ASCII text is transliterated, filesystem-reserved characters are
/// stripped and dots are replaced so the name never looks like an extension.
pub fn sanitize_name(raw: &str) -> String {
    let transliterated = deunicode::deunicode(raw);
    let cleaned = sanitize_filename::sanitize(transliterated.trim()).replace('.', "_");
    if cleaned.is_empty() {
        FALLBACK.to_owned()
    } else {
        cleaned
    }
}

/// Derive the display name for one track: "title (artist)" when both tags are
/// present, a single tag when only one is, the file stem otherwise.
pub fn song_name(tags: &TrackTags, source: &Path) -> String {
    let name = match (&tags.title, &tags.artist) {
        (Some(title), Some(artist)) => format!("{title} ({artist})"),
        (Some(title), None) => title.clone(),
        (None, Some(artist)) => artist.clone(),
        (None, None) => source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK.to_owned()),
    };
    sanitize_name(&name)
}

/// Resolve the album folder for a track, or `None` when the mode puts songs
/// directly under the output root. Missing tags fall back to "unknown".
pub fn resolve_folder(tags: &TrackTags, source: &Path, mode: NamingMode) -> Option<String> {
    match mode {
        NamingMode::None => None,
        NamingMode::Folder => {
            let parent = source
                .parent()
                .and_then(|dir| dir.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| FALLBACK.to_owned());
            Some(sanitize_name(&parent))
        }
        NamingMode::Artist => Some(sanitize_name(tags.artist.as_deref().unwrap_or(FALLBACK))),
        NamingMode::ArtistAlbum => {
            let artist = tags.artist.as_deref().unwrap_or(FALLBACK);
            let album = tags.album.as_deref().unwrap_or(FALLBACK);
            Some(sanitize_name(&format!("{artist} - {album}")))
        }
    }
}

/// Claim a name that no earlier track of this run holds, suffixing `_2`,
/// `_3`, ... until a free one is found. The winning name is recorded in
/// `allocated` so later calls cannot take it again.
pub fn allocate_unique(candidate: &str, allocated: &mut HashSet<String>) -> Result<String> {
    if allocated.insert(candidate.to_owned()) {
        return Ok(candidate.to_owned());
    }
    for suffix in 2..=MAX_NAME_PROBES {
        let probe = format!("{candidate}_{suffix}");
        if allocated.insert(probe.clone()) {
            return Ok(probe);
        }
    }
    Err(Error::CollisionExhausted(candidate.to_owned()))
}
