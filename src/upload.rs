use std::fs;
use std::path::{Path, PathBuf};

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use walkdir::WalkDir;

use crate::config::ObjectStoreCredentials;
use crate::error::SyncError;

pub trait ObjectStore {
    fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), SyncError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), SyncError> {
        (**self).put_file(bucket, key, path)
    }
}

/// S3 behind a blocking facade: each call is driven to completion on a private
/// current-thread runtime.
pub struct S3ObjectStore {
    client: Client,
    runtime: Runtime,
}

impl S3ObjectStore {
    pub fn new(credentials: &ObjectStoreCredentials) -> Result<Self, SyncError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "environment",
            ))
            .build();
        Ok(Self {
            client: Client::from_conf(config),
            runtime,
        })
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), SyncError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(path).await.map_err(|err| SyncError::Upload {
                key: key.to_string(),
                message: err.to_string(),
            })?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|err| SyncError::Upload {
                    key: key.to_string(),
                    message: DisplayErrorContext(&err).to_string(),
                })?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<FailedUpload>,
    pub staging_removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub key: String,
    pub reason: String,
}

pub struct Uploader<S: ObjectStore> {
    store: S,
}

impl<S: ObjectStore> Uploader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Mirrors every regular file under `data_dir` to `bucket` under `remote_prefix`, then
    /// removes `staging_dir` if any file was found. Individual upload failures are
    /// reported, not raised, and do not prevent the staging cleanup.
    pub fn upload(
        &self,
        data_dir: &Path,
        staging_dir: &Path,
        bucket: &str,
        remote_prefix: &str,
    ) -> Result<UploadReport, SyncError> {
        if !data_dir.exists() {
            return Err(SyncError::DirectoryMissing(data_dir.to_path_buf()));
        }

        let mut report = UploadReport::default();
        let files = list_files(data_dir, &mut report);
        if files.is_empty() {
            tracing::info!(data_dir = %data_dir.display(), "no files found, nothing to upload");
            return Ok(report);
        }

        for path in &files {
            let key = match object_key(data_dir, path, remote_prefix) {
                Ok(key) => key,
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "cannot derive object key");
                    report.failed.push(FailedUpload {
                        path: path.clone(),
                        key: String::new(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            match self.store.put_file(bucket, &key, path) {
                Ok(()) => {
                    tracing::info!(bucket, key = %key, "uploaded");
                    report.uploaded.push(key);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), bucket, key = %key, error = %err, "upload failed");
                    report.failed.push(FailedUpload {
                        path: path.clone(),
                        key,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if !report.failed.is_empty() {
            tracing::warn!(
                failed = report.failed.len(),
                staging_dir = %staging_dir.display(),
                "removing staging directory despite failed uploads"
            );
        }
        if staging_dir.exists() {
            fs::remove_dir_all(staging_dir).map_err(|err| {
                SyncError::Filesystem(format!("remove {}: {err}", staging_dir.display()))
            })?;
            tracing::info!(staging_dir = %staging_dir.display(), "staging directory removed");
            report.staging_removed = true;
        }
        Ok(report)
    }
}

/// Symlinks are followed. Entries the walk cannot read (dangling links, link loops,
/// unreadable directories) are recorded as failures and the walk carries on.
fn list_files(root: &Path, report: &mut UploadReport) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                tracing::error!(path = %path.display(), error = %err, "cannot read entry");
                report.failed.push(FailedUpload {
                    path,
                    key: String::new(),
                    reason: SyncError::Filesystem(err.to_string()).to_string(),
                });
            }
        }
    }
    files
}

/// `remote_prefix/<path relative to data_dir>` with forward slashes.
pub fn object_key(data_dir: &Path, path: &Path, remote_prefix: &str) -> Result<String, SyncError> {
    let relative = path.strip_prefix(data_dir).map_err(|_| {
        SyncError::Filesystem(format!(
            "{} is not under {}",
            path.display(),
            data_dir.display()
        ))
    })?;
    let relative = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let prefix = remote_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Ok(relative)
    } else {
        Ok(format!("{prefix}/{relative}"))
    }
}
