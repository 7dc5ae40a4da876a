use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use opendata_sync::domain::MetadataRecord;
use opendata_sync::error::SyncError;
use opendata_sync::store::{JsonMetadataStore, MetadataMap, MetadataStore};

fn store_in(temp: &tempfile::TempDir, file: &str) -> JsonMetadataStore {
    JsonMetadataStore::new(Utf8PathBuf::from_path_buf(temp.path().join(file)).unwrap())
}

#[test]
fn missing_file_loads_empty() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp, "metadados.json");
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn save_then_load_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp, "nested/metadados.json");
    let metadata = MetadataMap::from_records(vec![
        MetadataRecord {
            url: "https://dados.mg.gov.br/a.csv.gz".to_string(),
            last_modified: Some("2024-03-01T10:00:00.123456".to_string()),
            name: "Despesa 2024".to_string(),
            size: Some(json!(2048)),
        },
        MetadataRecord {
            url: "https://dados.mg.gov.br/b.csv.gz".to_string(),
            last_modified: None,
            name: "Execução".to_string(),
            size: None,
        },
    ]);

    store.save(&metadata).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded, metadata);

    store.save(&loaded).unwrap();
    assert_eq!(store.load().unwrap(), metadata);
}

#[test]
fn loads_file_written_by_previous_runs() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp, "metadados.json");
    std::fs::write(
        store.path().as_std_path(),
        r#"[
    {
        "url": "https://dados.mg.gov.br/a.csv.gz",
        "name": "Despesa 2024",
        "last_modified": "2024-03-01T10:00:00.123456",
        "size": "2048",
        "extra": true
    }
]"#,
    )
    .unwrap();

    let loaded = store.load().unwrap();
    let record = loaded.get("https://dados.mg.gov.br/a.csv.gz").unwrap();
    assert_eq!(record.size, Some(json!("2048")));
    assert_eq!(record.name, "Despesa 2024");

    store.save(&loaded).unwrap();
    assert_eq!(store.load().unwrap(), loaded);
}

#[test]
fn odd_sizes_are_kept_verbatim() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp, "metadados.json");
    let metadata = MetadataMap::from_records(
        [json!(-1), json!(1.5), json!("n/a")]
            .into_iter()
            .enumerate()
            .map(|(index, size)| MetadataRecord {
                url: format!("https://dados.mg.gov.br/{index}.csv.gz"),
                last_modified: None,
                name: String::new(),
                size: Some(size),
            }),
    );

    store.save(&metadata).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, metadata);
    assert_eq!(
        loaded.get("https://dados.mg.gov.br/1.csv.gz").unwrap().size,
        Some(json!(1.5))
    );
}

#[test]
fn record_without_url_is_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp, "metadados.json");
    std::fs::write(store.path().as_std_path(), r#"[{"name": "x"}]"#).unwrap();
    assert_matches!(store.load(), Err(SyncError::CorruptMetadata { .. }));
}

#[test]
fn invalid_json_is_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp, "metadados.json");
    std::fs::write(store.path().as_std_path(), "{not json").unwrap();
    assert_matches!(store.load(), Err(SyncError::CorruptMetadata { .. }));
}

#[test]
fn save_onto_directory_fails_without_clobbering() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("metadados.json");
    std::fs::create_dir_all(&target).unwrap();
    let store = JsonMetadataStore::new(Utf8PathBuf::from_path_buf(target.clone()).unwrap());

    let result = store.save(&MetadataMap::new());

    assert!(result.is_err());
    assert!(target.is_dir());
}
