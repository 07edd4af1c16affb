use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use futures::StreamExt;
use id3::TagLike;

use crate::error::{Error, Result};
use crate::service::{ArchiveStream, ConvertService};

/// Write a small fake mp3, tagged with whatever fields are given.
pub fn write_track(path: &Path, artist: Option<&str>, title: Option<&str>, album: Option<&str>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"not really mpeg frames").unwrap();
    if artist.is_none() && title.is_none() && album.is_none() {
        return;
    }
    let mut tag = id3::Tag::new();
    if let Some(artist) = artist {
        tag.set_artist(artist);
    }
    if let Some(title) = title {
        tag.set_title(title);
    }
    if let Some(album) = album {
        tag.set_album(album);
    }
    tag.write_to_path(path, id3::Version::Id3v24).unwrap();
}

/// Build an in-memory zip holding the given (name, contents) entries.
pub fn bundle_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// `ConvertService` serving staged archives, keyed by the source file stem.
/// Unstaged tracks fail, and every call is counted.
pub struct FixtureService {
    bundles: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
}

impl FixtureService {
    pub fn new() -> Self {
        Self {
            bundles: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn stage(&self, stem: &str, bundle: Vec<u8>) {
        self.bundles.lock().unwrap().insert(stem.to_owned(), bundle);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConvertService for FixtureService {
    async fn convert(&self, track: &Path) -> Result<ArchiveStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = track
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bundle = self
            .bundles
            .lock()
            .unwrap()
            .get(&stem)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no staged bundle for '{stem}'").into()))?;
        Ok(futures::stream::iter([Ok(Bytes::from(bundle))]).boxed())
    }
}
