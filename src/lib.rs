pub mod error;
pub use error::{Error, Result};

pub mod naming;
pub use naming::NamingMode;

pub mod metadata;

pub mod scan;

pub mod plan;
pub use plan::{build_plan, PlanOptions, TrackPlan};

pub mod poll;

pub mod service;
pub use service::{ConvertService, HttpConvertService, NullConvertService};

pub mod convert;
pub use convert::Converter;

pub mod background;
pub use background::{AlbumArtEnricher, ArtEnricher};

pub mod progress;
pub use progress::{NullProgressReporter, ProgressReporter};

pub mod batch;
pub use batch::{run_batch, TrackOutcome};

#[cfg(test)]
mod testutil;
