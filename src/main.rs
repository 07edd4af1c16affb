use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use stepforge::{
    AlbumArtEnricher, ArtEnricher, Converter, HttpConvertService, NamingMode,
    NullProgressReporter, PlanOptions, ProgressReporter, TrackPlan,
};

#[derive(Debug, Parser)]
struct Args {
    #[clap(subcommand)]
    subcmd: SubCmd,
}

#[derive(Debug, Parser)]
struct GroupLayout {
    /// Directory scanned for input audio files.
    #[clap(long, short = 'i')]
    input_dir: PathBuf,

    /// Directory the song folders are created under. Must already exist.
    #[clap(long, short = 'o')]
    output_dir: PathBuf,

    /// Glob selecting input files, relative to the input directory.
    ///
    /// '*' does not cross directory separators, use '**/*.mp3' to search
    /// subdirectories. Matching is case-insensitive.
    #[clap(long, short = 'm', default_value = "**/*.mp3")]
    mask: String,

    /// How song folders are grouped under the output directory.
    ///
    /// One of: folder, none, artist, artistAlbum.
    #[clap(long, default_value = "none", value_parser = parse_naming_mode)]
    naming: NamingMode,

    /// Prefix prepended to every album folder name.
    ///
    /// Requires a naming mode that creates album folders.
    #[clap(long)]
    album_prefix: Option<String>,

    /// Skip tracks whose song folder already holds a step file.
    #[clap(long)]
    skip_existing: bool,

    /// Copy a step file sitting next to the source instead of converting.
    #[clap(long)]
    reuse_steps: bool,
}

impl GroupLayout {
    fn create_options(self) -> PlanOptions {
        PlanOptions {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            mask: self.mask,
            naming: self.naming,
            album_prefix: self.album_prefix.filter(|prefix| !prefix.is_empty()),
            skip_existing: self.skip_existing,
            reuse_steps: self.reuse_steps,
        }
    }
}

#[derive(Debug, Parser)]
struct GroupService {
    /// Base URL of the conversion server.
    #[clap(long, env = "STEPFORGE_SERVER", default_value = "http://localhost:8888/")]
    server: String,

    /// Authorization token sent with every conversion request.
    #[clap(long, short = 't', env = "STEPFORGE_TOKEN")]
    token: String,

    /// Whole round trip timeout for one conversion, in seconds.
    ///
    /// Covers the upload, the chart generation on the server and the
    /// download of the reply archive.
    #[clap(long, default_value_t = 960)]
    timeout_secs: u64,
}

#[derive(Debug, Parser)]
enum SubCmd {
    Convert(ConvertArgs),
    Plan(PlanArgs),
}

/// Convert every matching track into a StepMania song folder.
#[derive(Debug, Parser)]
struct ConvertArgs {
    #[clap(flatten)]
    group_layout: GroupLayout,

    #[clap(flatten)]
    group_service: GroupService,

    /// Number of tracks converted in parallel.
    #[clap(long, short = 'c', default_value_t = default_concurrency())]
    concurrency: usize,

    /// Attach album art as the chart background.
    #[clap(long)]
    background: bool,

    /// Disable the progress bar.
    #[clap(long)]
    no_progress: bool,
}

/// Show where every matching track would end up, without converting.
#[derive(Debug, Parser)]
struct PlanArgs {
    #[clap(flatten)]
    group_layout: GroupLayout,
}

fn parse_naming_mode(value: &str) -> Result<NamingMode, stepforge::Error> {
    value.parse()
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
        );
        Self { bar }
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn update(&self, label: &str) {
        self.bar.set_message(format!("Converting {label}"));
    }

    fn increment(&self) {
        self.bar.inc(1);
    }

    fn stop(&self) {
        self.bar.finish_with_message("done");
    }
}

async fn subcmd_convert(args: ConvertArgs) -> Result<()> {
    let opts = args.group_layout.create_options();
    let plans = stepforge::build_plan(&opts).await?;
    if plans.is_empty() {
        tracing::info!("nothing to convert");
        return Ok(());
    }

    let service = Arc::new(HttpConvertService::new(
        &args.group_service.server,
        &args.group_service.token,
        Duration::from_secs(args.group_service.timeout_secs),
    )?);
    let art: Option<Arc<dyn ArtEnricher>> = if args.background {
        Some(Arc::new(AlbumArtEnricher::new()?))
    } else {
        None
    };
    let converter = Arc::new(Converter::new(service, art));
    let progress: Arc<dyn ProgressReporter> = if args.no_progress {
        Arc::new(NullProgressReporter)
    } else {
        Arc::new(BarProgress::new())
    };

    let outcomes = stepforge::run_batch(plans, converter, args.concurrency, progress).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::info!(
        "processing finished: {} converted, {} failed",
        outcomes.len() - failed,
        failed
    );
    Ok(())
}

async fn subcmd_plan(args: PlanArgs) -> Result<()> {
    let opts = args.group_layout.create_options();
    let plans = stepforge::build_plan(&opts).await?;
    for plan in &plans {
        println!(
            "{:<9} {} -> {}",
            helper_plan_status(plan),
            plan.source.display(),
            plan.song_path.display()
        );
    }
    println!("{} tracks planned", plans.len());
    Ok(())
}

fn helper_plan_status(plan: &TrackPlan) -> &'static str {
    if plan.already_converted {
        "existing"
    } else if plan.reuse {
        "reuse"
    } else {
        "convert"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,stepforge=info"))
        .unwrap();
    tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .init();

    let args = Args::parse();
    match args.subcmd {
        SubCmd::Convert(args) => subcmd_convert(args).await?,
        SubCmd::Plan(args) => subcmd_plan(args).await?,
    };

    Ok(())
}
