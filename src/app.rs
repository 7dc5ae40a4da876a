use serde::Serialize;

use crate::catalog::CatalogClient;
use crate::config::ResolvedConfig;
use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::store::MetadataStore;
use crate::sync::{ResourceOutcome, SyncEngine, SyncOptions};
use crate::upload::{ObjectStore, UploadReport, Uploader};

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    pub listed: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub filtered: usize,
    pub would_fetch: usize,
    pub dry_run: bool,
    pub records: usize,
    pub items: Vec<ResourceOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub bucket: String,
    pub remote_prefix: String,
    #[serde(flatten)]
    pub report: UploadReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub extract: ExtractResult,
    pub load: LoadResult,
}

pub struct App<C: CatalogClient, F: Fetcher> {
    config: ResolvedConfig,
    catalog: C,
    fetcher: F,
}

impl<C: CatalogClient, F: Fetcher> App<C, F> {
    pub fn new(config: ResolvedConfig, catalog: C, fetcher: F) -> Self {
        Self {
            config,
            catalog,
            fetcher,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Lists the catalog, syncs every resource and persists the metadata. Only a catalog
    /// or metadata-store failure aborts; per-resource failures end up in the result.
    pub fn extract(
        &self,
        store: &dyn MetadataStore,
        options: SyncOptions,
    ) -> Result<ExtractResult, SyncError> {
        let resources = self.catalog.list_resources()?;
        let engine = SyncEngine::new(
            &self.fetcher,
            self.config.base_output_dir.clone(),
            self.config.retry,
        )
        .with_options(options);
        let report = engine.sync_and_persist(&resources, store)?;

        tracing::info!(
            listed = resources.len(),
            fetched = report.fetched(),
            skipped = report.skipped(),
            failed = report.failed(),
            "extract finished"
        );

        Ok(ExtractResult {
            listed: resources.len(),
            fetched: report.fetched(),
            skipped: report.skipped(),
            failed: report.failed(),
            filtered: report.filtered(),
            would_fetch: report.would_fetch(),
            dry_run: options.dry_run,
            records: report.metadata.len(),
            items: report.outcomes,
        })
    }

    pub fn load<S: ObjectStore>(&self, object_store: S) -> Result<LoadResult, SyncError> {
        let uploader = Uploader::new(object_store);
        let report = uploader.upload(
            self.config.data_dir.as_std_path(),
            self.config.staging_dir.as_std_path(),
            &self.config.bucket,
            &self.config.remote_prefix,
        )?;
        tracing::info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "load finished"
        );
        Ok(LoadResult {
            bucket: self.config.bucket.clone(),
            remote_prefix: self.config.remote_prefix.clone(),
            report,
        })
    }

    pub fn run<S: ObjectStore>(
        &self,
        store: &dyn MetadataStore,
        object_store: S,
        options: SyncOptions,
    ) -> Result<RunResult, SyncError> {
        let extract = self.extract(store, options)?;
        let load = self.load(object_store)?;
        Ok(RunResult { extract, load })
    }
}
