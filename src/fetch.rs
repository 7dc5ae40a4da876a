use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;

use crate::catalog::default_headers;
use crate::domain::COMPRESSED_SUFFIX;
use crate::error::SyncError;
use crate::fs_util::gunzip_in_place;

/// Downloads one compressed resource into `output_dir` and decompresses it in place.
pub trait Fetcher {
    /// Rejects URLs that can never be fetched, before any attempt is spent on them.
    fn check_url(&self, _url: &str) -> Result<(), SyncError> {
        Ok(())
    }

    /// Returns the path of the decompressed file.
    fn fetch(&self, url: &str, output_dir: &Path) -> Result<PathBuf, SyncError>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn check_url(&self, url: &str) -> Result<(), SyncError> {
        (**self).check_url(url)
    }

    fn fetch(&self, url: &str, output_dir: &Path) -> Result<PathBuf, SyncError> {
        (**self).fetch(url, output_dir)
    }
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .timeout(timeout)
            .build()
            .map_err(|err| SyncError::Fetch(err.to_string()))?;
        Ok(Self { client })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), SyncError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "resource request failed".to_string());
            return Err(SyncError::FetchStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| SyncError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file).map_err(|err| SyncError::Fetch(err.to_string()))?;
        Ok(())
    }
}

impl Fetcher for HttpFetcher {
    fn check_url(&self, url: &str) -> Result<(), SyncError> {
        compressed_file_name(url).map(|_| ())
    }

    fn fetch(&self, url: &str, output_dir: &Path) -> Result<PathBuf, SyncError> {
        let destination = output_dir.join(compressed_file_name(url)?);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SyncError::Fetch(err.to_string()))?;
        self.write_response_to_file(response, &destination)?;
        gunzip_in_place(&destination)
    }
}

/// Base name of the remote file, taken from the last URL path segment.
pub fn remote_file_name(url: &str) -> Result<String, SyncError> {
    let parsed = Url::parse(url).map_err(|err| SyncError::Fetch(format!("{url}: {err}")))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .ok_or_else(|| SyncError::Fetch(format!("{url}: no file name in URL path")))
}

/// Like [`remote_file_name`], but the name must carry the gzip suffix so the download can
/// be decompressed next to it.
pub fn compressed_file_name(url: &str) -> Result<String, SyncError> {
    let name = remote_file_name(url)?;
    if name.ends_with(COMPRESSED_SUFFIX) {
        Ok(name)
    } else {
        Err(SyncError::Fetch(format!(
            "{url}: file name {name:?} has no {COMPRESSED_SUFFIX} suffix"
        )))
    }
}
