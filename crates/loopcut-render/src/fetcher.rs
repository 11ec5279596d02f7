// Source fetcher boundary (§1: out of scope, consumed as a trait).
//
// The core never hardcodes an HTTP stack; `HttpFetcher` is a usable default
// so the crate works out of the box, but callers may supply their own
// (auth, retries, a local-file scheme, a test double) by implementing
// `SourceFetcher`.

use loopcut_core::{RenderError, Result};

fn download_failed(msg: impl Into<String>) -> RenderError {
    RenderError::DownloadFailed(msg.into())
}

pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher { client: reqwest::blocking::Client::new() }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher::new()
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(uri).send().map_err(|e| download_failed(format!("{uri}: {e}")))?;
        if !resp.status().is_success() {
            return Err(download_failed(format!("{uri}: http status {}", resp.status())));
        }
        let bytes = resp.bytes().map_err(|e| download_failed(format!("{uri}: {e}")))?;
        Ok(bytes.to_vec())
    }
}
