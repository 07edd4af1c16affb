use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::background::ArtEnricher;
use crate::error::{Error, Result};
use crate::plan::TrackPlan;
use crate::poll;
use crate::scan;
use crate::service::ConvertService;

/// Name the reply archive is persisted under inside the song folder.
const ARCHIVE_NAME: &str = "song.zip";

/// Extracted bundle files can lag behind the extraction call on some
/// filesystems, probe a few times before declaring the bundle broken.
const BUNDLE_PROBES: u32 = 5;
const BUNDLE_PROBE_STEP: Duration = Duration::from_millis(100);

/// Produces one song folder per plan, either by converting through the
/// remote service or by copying steps that already sit next to the source.
pub struct Converter {
    service: Arc<dyn ConvertService>,
    art: Option<Arc<dyn ArtEnricher>>,
}

impl Converter {
    pub fn new(service: Arc<dyn ConvertService>, art: Option<Arc<dyn ArtEnricher>>) -> Self {
        Self { service, art }
    }

    /// Build the song folder for one plan. On success the folder holds
    /// `{song_name}.mp3` and `{song_name}.sm`; on failure whatever was
    /// written stays behind for inspection and the error describes the step
    /// that broke.
    pub async fn convert(&self, plan: &TrackPlan) -> Result<()> {
        if plan.reuse {
            self.reuse_local_steps(plan).await?;
        } else {
            self.convert_remote(plan).await?;
        }
        if let Some(art) = &self.art {
            if let Err(err) = art.enrich(&plan.source, &plan.song_path).await {
                tracing::warn!(
                    "could not attach background art for '{}': {:#}",
                    plan.song_name,
                    err
                );
            }
        }
        Ok(())
    }

    /// Copy the source audio and its sibling step file into the song folder.
    async fn reuse_local_steps(&self, plan: &TrackPlan) -> Result<()> {
        tracing::debug!("reusing local steps for '{}'", plan.song_name);
        tokio::fs::create_dir_all(&plan.song_path).await?;
        let audio = plan.song_path.join(format!("{}.mp3", plan.song_name));
        tokio::fs::copy(&plan.source, &audio).await?;
        let steps = plan.song_path.join(format!("{}.sm", plan.song_name));
        tokio::fs::copy(plan.source.with_extension("sm"), &steps).await?;
        Ok(())
    }

    /// Upload the track, persist and unpack the reply archive, then bring
    /// the bundle files onto their canonical names.
    async fn convert_remote(&self, plan: &TrackPlan) -> Result<()> {
        tokio::fs::create_dir_all(&plan.song_path).await?;

        let mut reply = self.service.convert(&plan.source).await?;
        let archive_path = plan.song_path.join(ARCHIVE_NAME);
        let mut archive = tokio::fs::File::create(&archive_path).await?;
        while let Some(chunk) = reply.next().await {
            archive.write_all(&chunk?).await?;
        }
        archive.flush().await?;
        drop(archive);

        extract_archive(archive_path.clone(), plan.song_path.clone()).await?;

        let ready = poll::poll_until(BUNDLE_PROBES, BUNDLE_PROBE_STEP, || {
            scan::audio_file_in(&plan.song_path).is_some()
                && scan::step_file_in(&plan.song_path).is_some()
        })
        .await;
        if !ready {
            tracing::debug!(
                "bundle under '{}' still incomplete after {} probes",
                plan.song_path.display(),
                BUNDLE_PROBES
            );
        }

        // a bundle without both files is a broken bundle, keep the archive
        // around so the run can be diagnosed
        let audio = scan::audio_file_in(&plan.song_path)
            .ok_or_else(|| Error::MissingAudio(plan.song_path.clone()))?;
        let steps = scan::step_file_in(&plan.song_path)
            .ok_or_else(|| Error::MissingSteps(plan.song_path.clone()))?;

        rename_to(&audio, &plan.song_path, &plan.song_name, "mp3").await?;
        rename_to(&steps, &plan.song_path, &plan.song_name, "sm").await?;
        tokio::fs::remove_file(&archive_path).await?;
        Ok(())
    }
}

async fn extract_archive(archive_path: PathBuf, into: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        archive.extract(&into)?;
        Ok(())
    })
    .await
    .expect("task should not panic")
}

async fn rename_to(current: &Path, dir: &Path, stem: &str, ext: &str) -> Result<()> {
    let wanted = dir.join(format!("{stem}.{ext}"));
    if current != wanted {
        tokio::fs::rename(current, &wanted).await?;
    }
    Ok(())
}
