/// Batch progress observer.
///
/// The orchestrator drives it: `start` once with the track count, `update`
/// and `increment` per track, `stop` after the last one. Implementations
/// must tolerate concurrent calls from several workers.
pub trait ProgressReporter: Send + Sync + 'static {
    fn start(&self, total: u64);
    fn update(&self, label: &str);
    fn increment(&self);
    fn stop(&self);
}

/// `ProgressReporter` that swallows every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn start(&self, _total: u64) {}

    fn update(&self, _label: &str) {}

    fn increment(&self) {}

    fn stop(&self) {}
}
