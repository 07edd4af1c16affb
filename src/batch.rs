use std::path::PathBuf;
use std::sync::Arc;

use crate::convert::Converter;
use crate::error::Result;
use crate::plan::TrackPlan;
use crate::progress::ProgressReporter;

/// What happened to one planned track.
#[derive(Debug)]
pub struct TrackOutcome {
    pub song_name: String,
    pub source: PathBuf,
    pub result: Result<()>,
}

/// Convert every plan with a bounded worker pool.
///
/// At most `concurrency` tracks are in flight at once. A failing track is
/// logged and reported in its outcome, it never takes the rest of the batch
/// down, so the returned vec always holds one outcome per plan.
pub async fn run_batch(
    plans: Vec<TrackPlan>,
    converter: Arc<Converter>,
    concurrency: usize,
    progress: Arc<dyn ProgressReporter>,
) -> Vec<TrackOutcome> {
    let workers = concurrency.max(1);
    let total = plans.len();
    let (ptx, prx) = flume::bounded::<TrackPlan>(workers);
    let (otx, orx) = flume::unbounded::<TrackOutcome>();

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let prx = prx.clone();
        let otx = otx.clone();
        let converter = converter.clone();
        let progress = progress.clone();
        handles.push(tokio::spawn(async move {
            while let Ok(plan) = prx.recv_async().await {
                progress.update(&plan.song_name);
                tracing::debug!("converting '{}'", plan.source.display());
                let result = converter.convert(&plan).await;
                match &result {
                    Ok(()) => tracing::info!("converted '{}'", plan.song_name),
                    Err(err) => tracing::error!("failed to convert '{}': {}", plan.song_name, err),
                }
                progress.increment();
                let outcome = TrackOutcome {
                    song_name: plan.song_name,
                    source: plan.source,
                    result,
                };
                let _ = otx.send_async(outcome).await;
            }
        }));
    }
    // workers hold the only live channel ends now, a dead pool fails the
    // sends below instead of blocking them
    drop(prx);
    drop(otx);

    progress.start(total as u64);
    for plan in plans {
        let _ = ptx.send_async(plan).await;
    }
    drop(ptx);

    let mut outcomes = Vec::with_capacity(total);
    while let Ok(outcome) = orx.recv_async().await {
        outcomes.push(outcome);
    }
    for handle in handles {
        let _ = handle.await;
    }
    progress.stop();
    outcomes
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::Error;
    use crate::naming::NamingMode;
    use crate::plan::{build_plan, PlanOptions};
    use crate::service::{ArchiveStream, ConvertService};
    use crate::testutil::{bundle_zip, write_track, FixtureService};

    fn options(input: &Path, output: &Path) -> PlanOptions {
        PlanOptions {
            input_dir: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            mask: "**/*.mp3".to_owned(),
            naming: NamingMode::None,
            album_prefix: None,
            skip_existing: false,
            reuse_steps: false,
        }
    }

    fn roots() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        (dir, input, output)
    }

    fn full_bundle(title: &str) -> Vec<u8> {
        bundle_zip(&[
            ("song.mp3", b"audio"),
            ("song.sm", format!("#TITLE:{title};").as_bytes()),
        ])
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn start(&self, total: u64) {
            self.events.lock().unwrap().push(format!("start {total}"));
        }

        fn update(&self, label: &str) {
            self.events.lock().unwrap().push(format!("update {label}"));
        }

        fn increment(&self) {
            self.events.lock().unwrap().push("increment".to_owned());
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("stop".to_owned());
        }
    }

    struct PanickyService;

    #[async_trait::async_trait]
    impl ConvertService for PanickyService {
        async fn convert(&self, _track: &Path) -> Result<ArchiveStream> {
            panic!("simulated worker death");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_bad_track_does_not_stop_the_batch() {
        let (_dir, input, output) = roots();
        write_track(&input.join("a.mp3"), Some("A"), Some("One"), None);
        write_track(&input.join("b.mp3"), Some("B"), Some("Two"), None);
        write_track(&input.join("c.mp3"), Some("C"), Some("Three"), None);

        let service = FixtureService::new();
        service.stage("a", full_bundle("One"));
        // "b" gets a bundle without a step file, its conversion fails
        service.stage("b", bundle_zip(&[("song.mp3", b"audio")]));
        service.stage("c", full_bundle("Three"));

        let plans = build_plan(&options(&input, &output)).await.unwrap();
        let converter = Arc::new(Converter::new(Arc::new(service), None));
        let outcomes = run_batch(
            plans,
            converter,
            2,
            Arc::new(crate::progress::NullProgressReporter),
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 2);
        let failed = outcomes.iter().find(|o| o.result.is_err()).unwrap();
        assert!(failed.source.ends_with("b.mp3"));
        assert!(matches!(failed.result, Err(Error::MissingSteps(_))));

        assert!(output.join("One (A)/One (A).sm").is_file());
        assert!(output.join("Three (C)/Three (C).sm").is_file());
        // the broken track keeps its archive for diagnosis and nothing else
        let broken = output.join("Two (B)");
        assert!(broken.join("song.zip").is_file());
        assert!(!broken.join("Two (B).sm").exists());
        assert!(!broken.join("Two (B).mp3").exists());
    }

    #[tokio::test]
    async fn test_panicked_workers_do_not_hang_the_batch() {
        let (_dir, input, output) = roots();
        write_track(&input.join("a.mp3"), Some("A"), Some("One"), None);
        write_track(&input.join("b.mp3"), Some("B"), Some("Two"), None);
        write_track(&input.join("c.mp3"), Some("C"), Some("Three"), None);

        let plans = build_plan(&options(&input, &output)).await.unwrap();
        let converter = Arc::new(Converter::new(Arc::new(PanickyService), None));
        // with the pool dead after the first plan, dispatching the rest must
        // fail fast rather than wait for a receiver that is never coming back
        let outcomes = tokio::time::timeout(
            Duration::from_secs(10),
            run_batch(
                plans,
                converter,
                1,
                Arc::new(crate::progress::NullProgressReporter),
            ),
        )
        .await
        .expect("batch should return after its workers die");
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_converts_nothing_new() {
        let (_dir, input, output) = roots();
        write_track(&input.join("a.mp3"), Some("A"), Some("One"), None);
        write_track(&input.join("b.mp3"), Some("B"), Some("Two"), None);

        let service = Arc::new(FixtureService::new());
        service.stage("a", full_bundle("One"));
        service.stage("b", full_bundle("Two"));
        let converter = Arc::new(Converter::new(service.clone(), None));
        let progress = Arc::new(crate::progress::NullProgressReporter);

        let mut opts = options(&input, &output);
        opts.skip_existing = true;

        let plans = build_plan(&opts).await.unwrap();
        assert_eq!(plans.len(), 2);
        let outcomes = run_batch(plans, converter.clone(), 2, progress.clone()).await;
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert_eq!(service.calls(), 2);

        // the song folders now hold step files, a rerun plans nothing
        let plans = build_plan(&opts).await.unwrap();
        assert!(plans.is_empty());
        let outcomes = run_batch(plans, converter, 2, progress).await;
        assert!(outcomes.is_empty());
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_progress_sees_every_track() {
        let (_dir, input, output) = roots();
        write_track(&input.join("a.mp3"), Some("A"), Some("One"), None);
        write_track(&input.join("b.mp3"), Some("B"), Some("Two"), None);

        let service = FixtureService::new();
        service.stage("a", full_bundle("One"));
        service.stage("b", full_bundle("Two"));

        let plans = build_plan(&options(&input, &output)).await.unwrap();
        let converter = Arc::new(Converter::new(Arc::new(service), None));
        let progress = Arc::new(RecordingProgress::default());
        run_batch(plans, converter, 1, progress.clone()).await;

        let events = progress.events.lock().unwrap();
        assert_eq!(events[0], "start 2");
        assert_eq!(events[events.len() - 1], "stop");
        assert_eq!(events.iter().filter(|e| *e == "increment").count(), 2);
        assert!(events.iter().any(|e| e.as_str() == "update One (A)"));
        assert!(events.iter().any(|e| e.as_str() == "update Two (B)"));
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let (_dir, input, output) = roots();
        write_track(&input.join("a.mp3"), Some("A"), Some("One"), None);

        let service = FixtureService::new();
        service.stage("a", full_bundle("One"));
        let plans = build_plan(&options(&input, &output)).await.unwrap();
        let converter = Arc::new(Converter::new(Arc::new(service), None));
        let outcomes = run_batch(
            plans,
            converter,
            0,
            Arc::new(crate::progress::NullProgressReporter),
        )
        .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
    }
}
