use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};

use crate::error::{Error, Result};
use crate::service::{ArchiveStream, ConvertService};

/// Field and file name the server expects for the uploaded track.
const UPLOAD_FIELD: &str = "song";
const UPLOAD_NAME: &str = "song.mp3";
/// Endpoint that replies with a zip bundle.
const ENDPOINT: &str = "plain";

/// `ConvertService` backed by the real conversion server.
///
/// The audio file is streamed up as one multipart request and the zip reply
/// is streamed back down. `timeout` bounds the whole round trip, uploads of
/// large files plus chart generation can take minutes.
#[derive(Debug)]
pub struct HttpConvertService {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    token: String,
}

impl HttpConvertService {
    pub fn new(server: &str, token: &str, timeout: Duration) -> Result<Self> {
        let mut base = server.to_owned();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = reqwest::Url::parse(&base)
            .and_then(|url| url.join(ENDPOINT))
            .map_err(|err| Error::Config(format!("invalid server url '{server}': {err}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Config(format!("building http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            token: token.to_owned(),
        })
    }
}

#[async_trait::async_trait]
impl ConvertService for HttpConvertService {
    async fn convert(&self, track: &Path) -> Result<ArchiveStream> {
        let file = tokio::fs::File::open(track).await?;
        let part = Part::stream(reqwest::Body::from(file))
            .file_name(UPLOAD_NAME)
            .mime_str("audio/mpeg")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        tracing::debug!("uploading '{}' to {}", track.display(), self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, self.token.as_str())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(
                format!("server replied {status} for '{}'", track.display()).into(),
            ));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
            .boxed();
        Ok(stream)
    }
}
