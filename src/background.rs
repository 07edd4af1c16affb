use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::error::Error;
use crate::metadata;
use crate::scan;

/// StepMania background bounds, charts render the image letterboxed into
/// this box so anything larger is wasted bytes.
const BACKGROUND_WIDTH: u32 = 2049;
const BACKGROUND_HEIGHT: u32 = 640;

const SEARCH_URL: &str = "https://itunes.apple.com/search";
const ART_TIMEOUT: Duration = Duration::from_secs(30);

/// Decorates a finished song folder with album art.
///
/// Failures here must never fail the track, callers log and move on.
#[async_trait::async_trait]
pub trait ArtEnricher: Send + Sync + 'static {
    async fn enrich(&self, track: &Path, song_dir: &Path) -> anyhow::Result<()>;
}

/// `ArtEnricher` that pulls art from the track's own ID3 picture frame and
/// falls back to an album search on the iTunes catalog. The original image
/// is kept next to the resized background.
pub struct AlbumArtEnricher {
    client: reqwest::Client,
}

impl AlbumArtEnricher {
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(ART_TIMEOUT)
            .build()
            .map_err(|err| Error::Config(format!("building art http client: {err}")))?;
        Ok(Self { client })
    }

    async fn lookup_art(&self, track: &Path) -> anyhow::Result<Option<(String, Vec<u8>)>> {
        let tags = metadata::read_tags(track).await;
        let Some(artist) = tags.artist else {
            return Ok(None);
        };
        let term = match tags.album {
            Some(album) => format!("{artist} {album}"),
            None => artist,
        };

        let url = reqwest::Url::parse_with_params(
            SEARCH_URL,
            &[("term", term.as_str()), ("entity", "album"), ("limit", "1")],
        )
        .context("building album search url")?;
        tracing::debug!("searching album art: {}", url);
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let reply: SearchReply = serde_json::from_str(&body).context("parsing album search reply")?;

        let Some(artwork_url) = reply
            .results
            .into_iter()
            .find_map(|hit| hit.artwork_url_100)
        else {
            return Ok(None);
        };
        // the catalog serves larger renditions under the same path
        let artwork_url = artwork_url.replace("100x100", "600x600");
        let bytes = self
            .client
            .get(&artwork_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let format = image::guess_format(&bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("jpg");
        Ok(Some((format.to_owned(), bytes.to_vec())))
    }
}

#[async_trait::async_trait]
impl ArtEnricher for AlbumArtEnricher {
    async fn enrich(&self, track: &Path, song_dir: &Path) -> anyhow::Result<()> {
        let art = match embedded_art(track) {
            Some(art) => Some(art),
            None => self.lookup_art(track).await?,
        };
        let Some((format, data)) = art else {
            tracing::debug!("no album art found for '{}'", track.display());
            return Ok(());
        };

        let original = song_dir.join(format!("background.original.{format}"));
        tokio::fs::write(&original, &data)
            .await
            .context("persisting original album art")?;

        let background_name = format!("background.{format}");
        resize_to_background(original, song_dir.join(&background_name)).await?;
        patch_step_file(song_dir, &background_name).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
}

/// First picture frame embedded in the track's tag, as (extension, bytes).
fn embedded_art(track: &Path) -> Option<(String, Vec<u8>)> {
    let tag = id3::Tag::read_from_path(track).ok()?;
    let picture = tag.pictures().next()?;
    let format = picture
        .mime_type
        .trim_start_matches("image/")
        .to_ascii_lowercase();
    if format.is_empty() {
        return None;
    }
    Some((format, picture.data.clone()))
}

async fn resize_to_background(original: PathBuf, resized: PathBuf) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let art = image::open(&original).context("decoding album art")?;
        art.resize(
            BACKGROUND_WIDTH,
            BACKGROUND_HEIGHT,
            image::imageops::FilterType::Lanczos3,
        )
        .save(&resized)
        .context("writing resized background")?;
        Ok(())
    })
    .await
    .expect("task should not panic")
}

/// Point the chart at the background image unless it already names one.
async fn patch_step_file(song_dir: &Path, background_name: &str) -> anyhow::Result<()> {
    let Some(steps) = scan::step_file_in(song_dir) else {
        anyhow::bail!("no step file under '{}' to decorate", song_dir.display());
    };
    let chart = tokio::fs::read_to_string(&steps).await?;
    if chart.contains("#BACKGROUND:") {
        return Ok(());
    }
    let patched = format!("#BACKGROUND:{background_name};\n{chart}");
    tokio::fs::write(&steps, patched).await?;
    Ok(())
}
