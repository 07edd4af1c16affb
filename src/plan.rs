use std::collections::HashSet;
use std::path::PathBuf;

use futures::StreamExt;

use crate::error::{Error, Result};
use crate::metadata::{self, TrackTags};
use crate::naming::{self, NamingMode};
use crate::scan;

/// How many files have their tags read ahead while the plan is assembled.
const TAG_FANOUT: usize = 3;

/// One track's resolved placement, everything the conversion step needs.
#[derive(Debug, Clone)]
pub struct TrackPlan {
    /// Absolute path of the input audio file.
    pub source: PathBuf,
    /// Directory the song folder is created under.
    pub target_dir: PathBuf,
    /// Run-unique song name, also the audio and step file stem.
    pub song_name: String,
    /// The song folder itself, `target_dir/song_name`.
    pub song_path: PathBuf,
    /// A step file already sits in the song folder.
    pub already_converted: bool,
    /// A step file sits next to the source file.
    pub local_steps: bool,
    /// Copy the local step file instead of calling the conversion service.
    pub reuse: bool,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mask: String,
    pub naming: NamingMode,
    pub album_prefix: Option<String>,
    pub skip_existing: bool,
    pub reuse_steps: bool,
}

/// Map every matching input file to a collision-free song folder.
///
/// Configuration problems surface here, before any file is touched. Tags are
/// prefetched a few files ahead but names are claimed strictly in discovery
/// order, so two equally named tracks always resolve the same way.
pub async fn build_plan(opts: &PlanOptions) -> Result<Vec<TrackPlan>> {
    if !opts.output_dir.is_dir() {
        return Err(Error::Config(format!(
            "output directory '{}' does not exist",
            opts.output_dir.display()
        )));
    }
    if opts.album_prefix.is_some() && opts.naming == NamingMode::None {
        return Err(Error::Config(
            "an album prefix requires a naming mode that creates album folders".to_owned(),
        ));
    }

    let sources = scan::discover_tracks(&opts.input_dir, &opts.mask).await?;
    tracing::info!(
        "planning {} tracks from '{}'",
        sources.len(),
        opts.input_dir.display()
    );

    let mut tagged = futures::stream::iter(sources)
        .map(|source| async move {
            let tags = metadata::read_tags(&source).await;
            (source, tags)
        })
        .buffered(TAG_FANOUT);

    let mut allocated = HashSet::new();
    let mut plans = Vec::new();
    while let Some((source, tags)) = tagged.next().await {
        plans.push(plan_track(source, &tags, &mut allocated, opts)?);
    }

    if opts.skip_existing {
        let planned = plans.len();
        plans.retain(|plan| !plan.already_converted);
        tracing::info!("skipping {} already converted tracks", planned - plans.len());
    }
    Ok(plans)
}

fn plan_track(
    source: PathBuf,
    tags: &TrackTags,
    allocated: &mut HashSet<String>,
    opts: &PlanOptions,
) -> Result<TrackPlan> {
    let target_dir = match naming::resolve_folder(tags, &source, opts.naming) {
        Some(folder) => {
            let prefix = opts.album_prefix.as_deref().unwrap_or("");
            opts.output_dir.join(format!("{prefix}{folder}"))
        }
        None => opts.output_dir.clone(),
    };
    let song_name = naming::allocate_unique(&naming::song_name(tags, &source), allocated)?;
    let song_path = target_dir.join(&song_name);
    let already_converted = scan::step_file_in(&song_path).is_some();
    let local_steps = source.with_extension("sm").is_file();
    Ok(TrackPlan {
        reuse: local_steps && opts.reuse_steps,
        source,
        target_dir,
        song_name,
        song_path,
        already_converted,
        local_steps,
    })
}
