use std::path::Path;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

mod http;
mod null;

pub use http::HttpConvertService;
pub use null::NullConvertService;

/// Streamed zip bundle coming back from the conversion server.
pub type ArchiveStream = BoxStream<'static, std::io::Result<Bytes>>;

/// A remote service that turns one audio file into a step-chart bundle.
///
/// Implementations are shared across workers, every call uploads a single
/// track and yields the reply archive as a byte stream.
#[async_trait::async_trait]
pub trait ConvertService: Send + Sync + 'static {
    async fn convert(&self, track: &Path) -> Result<ArchiveStream>;
}
