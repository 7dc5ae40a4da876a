//! Incremental sync: reconciles a catalog listing against persisted metadata and
//! fetches only resources that are new or newer than their stored version.

use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::domain::{MetadataRecord, ResourceDescriptor, ResourceTimestamp, folder_name};
use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::normalize::normalize;
use crate::retry::RetryPolicy;
use crate::store::{MetadataMap, MetadataStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Fetch every compressed resource regardless of stored timestamps.
    pub force: bool,
    /// Decide only: no directories, no downloads, no metadata writes.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    /// Missing URL or not a gzip resource.
    Filtered,
    /// Stored version is at least as new as the listed one.
    Skipped,
    /// Would be fetched; only produced in dry runs.
    WouldFetch,
    Fetched { path: PathBuf },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceOutcome {
    pub url: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub metadata: MetadataMap,
    pub outcomes: Vec<ResourceOutcome>,
}

impl SyncReport {
    pub fn fetched(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Fetched { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Failed { .. }))
    }

    pub fn filtered(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Filtered))
    }

    pub fn would_fetch(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::WouldFetch))
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|item| predicate(&item.outcome))
            .count()
    }
}

pub struct SyncEngine<F: Fetcher> {
    fetcher: F,
    base_dir: Utf8PathBuf,
    retry: RetryPolicy,
    options: SyncOptions,
}

impl<F: Fetcher> SyncEngine<F> {
    pub fn new(fetcher: F, base_dir: impl Into<Utf8PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            base_dir: base_dir.into(),
            retry,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Processes `resources` in listing order and returns the updated metadata together
    /// with one outcome per resource. Never fails as a whole: every error is confined to
    /// the resource that raised it.
    pub fn sync(&self, resources: &[ResourceDescriptor], metadata: MetadataMap) -> SyncReport {
        let mut metadata = metadata;
        let outcomes = resources
            .iter()
            .map(|resource| {
                let outcome = self.sync_one(resource, &mut metadata);
                ResourceOutcome {
                    url: resource.url.clone(),
                    name: resource.name.clone(),
                    outcome,
                }
            })
            .collect();
        SyncReport { metadata, outcomes }
    }

    /// Loads state from `store`, syncs, and saves the full mapping back unless this is a
    /// dry run.
    pub fn sync_and_persist(
        &self,
        resources: &[ResourceDescriptor],
        store: &dyn MetadataStore,
    ) -> Result<SyncReport, SyncError> {
        let metadata = store.load()?;
        let report = self.sync(resources, metadata);
        if !self.options.dry_run {
            store.save(&report.metadata)?;
            tracing::info!(records = report.metadata.len(), "metadata saved");
        }
        Ok(report)
    }

    fn sync_one(&self, resource: &ResourceDescriptor, metadata: &mut MetadataMap) -> Outcome {
        let Some(url) = resource.compressed_url() else {
            tracing::debug!(url = ?resource.url, "not a compressed resource, ignoring");
            return Outcome::Filtered;
        };

        let folder = normalize(folder_name(&resource.name));
        let output_dir = self.base_dir.join(&folder);
        if !self.options.dry_run {
            if let Err(err) = fs::create_dir_all(output_dir.as_std_path()) {
                tracing::warn!(url, dir = %output_dir, error = %err, "cannot create output directory");
                return Outcome::Failed {
                    reason: SyncError::Filesystem(err.to_string()).to_string(),
                };
            }
        }

        if !self.options.force {
            if let Some(previous) = metadata.get(url) {
                match is_unchanged(previous, resource) {
                    Ok(true) => {
                        tracing::info!(url, "resource not updated, skipping");
                        return Outcome::Skipped;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(url, error = %err, "cannot compare modification times");
                        return Outcome::Failed {
                            reason: err.to_string(),
                        };
                    }
                }
            }
        }

        if self.options.dry_run {
            tracing::info!(url, dir = %output_dir, "would fetch resource");
            return Outcome::WouldFetch;
        }

        if let Err(err) = self.fetcher.check_url(url) {
            tracing::warn!(url, error = %err, "resource cannot be fetched");
            return Outcome::Failed {
                reason: err.to_string(),
            };
        }

        tracing::info!(url, dir = %output_dir, "fetching resource");
        let result = self.retry.run(|attempt| {
            if attempt > 1 {
                tracing::info!(url, attempt, "retrying fetch");
            }
            self.fetcher.fetch(url, output_dir.as_std_path())
        });
        match result {
            Ok(path) => {
                tracing::info!(url, path = %path.display(), "resource extracted");
                metadata.upsert(MetadataRecord::from_descriptor(url, resource));
                Outcome::Fetched { path }
            }
            Err(err) => {
                tracing::warn!(url, error = %err, cause = %err.root_cause(), "fetch failed");
                Outcome::Failed {
                    reason: format!("{err}: {}", err.root_cause()),
                }
            }
        }
    }
}

/// True when the listed version is not newer than the stored one.
fn is_unchanged(
    previous: &MetadataRecord,
    resource: &ResourceDescriptor,
) -> Result<bool, SyncError> {
    let stored = parse_timestamp(previous.last_modified.as_deref())?;
    let incoming = parse_timestamp(resource.last_modified.as_deref())?;
    Ok(incoming <= stored)
}

fn parse_timestamp(value: Option<&str>) -> Result<ResourceTimestamp, SyncError> {
    match value {
        Some(value) => value.parse(),
        None => Err(SyncError::TimestampParse {
            value: String::new(),
            message: "missing last_modified".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn fetch(&self, _url: &str, _output_dir: &Path) -> Result<PathBuf, SyncError> {
            Err(SyncError::Fetch("offline".to_string()))
        }
    }

    #[test]
    fn first_time_failure_creates_no_record() {
        let temp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let engine = SyncEngine::new(
            FailingFetcher,
            base,
            RetryPolicy::new(2, std::time::Duration::ZERO),
        );
        let resources = vec![ResourceDescriptor {
            url: Some("https://example.org/a.csv.gz".to_string()),
            name: "Despesa 2024".to_string(),
            last_modified: Some("2024-01-01T00:00:00.000000".to_string()),
            size: Some(json!(1)),
        }];

        let report = engine.sync(&resources, MetadataMap::new());

        assert!(report.metadata.is_empty());
        assert_eq!(report.failed(), 1);
    }
}
