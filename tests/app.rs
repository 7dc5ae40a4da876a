use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;

use opendata_sync::app::App;
use opendata_sync::catalog::CatalogClient;
use opendata_sync::config::{Config, ConfigLoader, ResolvedConfig};
use opendata_sync::domain::ResourceDescriptor;
use opendata_sync::error::SyncError;
use opendata_sync::fetch::{Fetcher, remote_file_name};
use opendata_sync::fs_util::gunzip_in_place;
use opendata_sync::retry::RetryPolicy;
use opendata_sync::store::{JsonMetadataStore, MetadataStore};
use opendata_sync::sync::SyncOptions;
use opendata_sync::upload::ObjectStore;

struct MockCatalog {
    resources: Option<Vec<ResourceDescriptor>>,
}

impl CatalogClient for MockCatalog {
    fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SyncError> {
        self.resources
            .clone()
            .ok_or_else(|| SyncError::CatalogUnavailable("connection refused".to_string()))
    }
}

/// Writes a gzip payload where the HTTP download would land, then extracts it.
#[derive(Default)]
struct GzipFetcher {
    calls: Mutex<usize>,
}

impl Fetcher for GzipFetcher {
    fn fetch(&self, url: &str, output_dir: &Path) -> Result<PathBuf, SyncError> {
        *self.calls.lock().unwrap() += 1;
        let destination = output_dir.join(remote_file_name(url)?);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(url.as_bytes()).unwrap();
        std::fs::write(&destination, encoder.finish().unwrap()).unwrap();
        gunzip_in_place(&destination)
    }
}

#[derive(Default)]
struct MockObjectStore {
    keys: Mutex<Vec<String>>,
}

impl ObjectStore for MockObjectStore {
    fn put_file(&self, _bucket: &str, key: &str, _path: &Path) -> Result<(), SyncError> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

fn test_config(root: &Path) -> ResolvedConfig {
    let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap();
    let mut config = ConfigLoader::resolve_config(Config::default()).unwrap();
    config.base_output_dir = root.join("data/raw");
    config.metadata_file = root.join("data/metadados_despesa.json");
    config.data_dir = root.join("data");
    config.staging_dir = root.join("data/raw");
    config.retry = RetryPolicy::new(3, Duration::ZERO);
    config
}

fn listing() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            url: Some("https://dados.mg.gov.br/download/despesa_2024.csv.gz".to_string()),
            name: "Despesa - Pagamentos 2024".to_string(),
            last_modified: Some("2024-03-01T10:00:00.123456".to_string()),
            size: Some(json!(10)),
        },
        ResourceDescriptor {
            url: Some("https://dados.mg.gov.br/download/leiame.pdf".to_string()),
            name: "Leia-me".to_string(),
            last_modified: Some("2024-03-01T10:00:00.123456".to_string()),
            size: Some(json!(10)),
        },
    ]
}

#[test]
fn extract_then_load_mirrors_tree() {
    let temp = tempfile::tempdir().unwrap();
    let config = test_config(temp.path());
    let metadata = JsonMetadataStore::new(config.metadata_file.clone());
    let app = App::new(
        config,
        MockCatalog {
            resources: Some(listing()),
        },
        GzipFetcher::default(),
    );

    let extract = app.extract(&metadata, SyncOptions::default()).unwrap();
    assert_eq!(extract.listed, 2);
    assert_eq!(extract.fetched, 1);
    assert_eq!(extract.filtered, 1);

    let extracted = temp
        .path()
        .join("data/raw/despesa_pagamentos/despesa_2024.csv");
    assert_eq!(
        std::fs::read_to_string(&extracted).unwrap(),
        "https://dados.mg.gov.br/download/despesa_2024.csv.gz"
    );
    assert!(!extracted.with_extension("csv.gz").exists());
    assert_eq!(metadata.load().unwrap().len(), 1);

    let again = app.extract(&metadata, SyncOptions::default()).unwrap();
    assert_eq!(again.fetched, 0);
    assert_eq!(again.skipped, 1);

    let object_store = MockObjectStore::default();
    let load = app.load(&object_store).unwrap();
    let mut keys = object_store.keys.lock().unwrap().clone();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "despesas-mg/metadados_despesa.json",
            "despesas-mg/raw/despesa_pagamentos/despesa_2024.csv",
        ]
    );
    assert!(load.report.staging_removed);
    assert!(!temp.path().join("data/raw").exists());
    assert!(temp.path().join("data/metadados_despesa.json").exists());
}

#[test]
fn catalog_failure_aborts_before_saving() {
    let temp = tempfile::tempdir().unwrap();
    let config = test_config(temp.path());
    let metadata = JsonMetadataStore::new(config.metadata_file.clone());
    let fetcher = GzipFetcher::default();
    let app = App::new(config, MockCatalog { resources: None }, &fetcher);

    let err = app.extract(&metadata, SyncOptions::default()).unwrap_err();

    assert_matches!(err, SyncError::CatalogUnavailable(_));
    assert_eq!(*fetcher.calls.lock().unwrap(), 0);
    assert!(!metadata.path().as_std_path().exists());
}
