//! Local file source

use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Request, Transport};

/// Reads documents from `file://` URLs or plain paths
#[derive(Clone, Copy, Debug, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>> {
        let path = file_path(&request.target)?;
        if request.body.is_some() {
            debug!(path = %path.display(), "request body ignored for file source");
        }
        tokio::fs::read(&path)
            .await
            .map_err(|err| Error::transport(format!("failed to read {}: {err}", path.display())))
    }
}

fn file_path(target: &str) -> Result<PathBuf> {
    if !target.starts_with("file:") {
        return Ok(PathBuf::from(target));
    }
    let url = Url::parse(target)
        .map_err(|err| Error::transport(format!("invalid file url {target}: {err}")))?;
    url.to_file_path()
        .map_err(|()| Error::transport(format!("not a local file url: {target}")))
}
