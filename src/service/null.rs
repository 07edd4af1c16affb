use std::path::Path;

use crate::error::{Error, Result};
use crate::service::{ArchiveStream, ConvertService};

/// `ConvertService` that refuses every request. Useful wherever a service
/// handle is required but no network contact is expected, reuse-only runs
/// fail loudly if something tries to convert through it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConvertService;

#[async_trait::async_trait]
impl ConvertService for NullConvertService {
    async fn convert(&self, _track: &Path) -> Result<ArchiveStream> {
        Err(Error::Transport("NullConvertService::convert".into()))
    }
}
