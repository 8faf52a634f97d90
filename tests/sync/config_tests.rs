// Tests for loading mirror configuration files

use std::io::Write;

use mirrorsync::config::{PipelineConfig, SourceKind};
use mirrorsync::sync::{DuplicatePolicy, FingerprintAlgorithm};
use mirrorsync::EqualityStrategy;
use tempfile::NamedTempFile;

#[test]
fn test_load_pipeline_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[mirror]]
name = "bls-pr"
source_url = "https://download.example.gov/pub/time.series/pr/"
bucket_name = "rearc-data"
bucket_prefix = "bls/pr"
include = ["pr.*"]
contact_email = "data@example.com"
duplicates = "last_wins"

[[mirror]]
name = "population"
source_kind = "json_snapshot"
source_url = "https://datausa.example.io/api/data?drilldowns=Nation&measures=Population"
bucket_name = "rearc-data"
bucket_prefix = "population"
fingerprint = "sha256"
equality = "fetch_and_hash"
"#
    )
    .unwrap();

    let pipeline = PipelineConfig::load(file.path()).unwrap();
    assert_eq!(pipeline.mirrors.len(), 2);

    let bls = pipeline.mirror("bls-pr").unwrap();
    assert_eq!(bls.contact_email.as_deref(), Some("data@example.com"));
    assert_eq!(bls.duplicates, DuplicatePolicy::LastWins);

    let population = pipeline.mirror("population").unwrap();
    assert_eq!(population.source_kind, SourceKind::JsonSnapshot);
    assert_eq!(population.fingerprint, FingerprintAlgorithm::Sha256);
    assert_eq!(population.equality, EqualityStrategy::FetchAndHash);
}

#[test]
fn test_invalid_mirror_fails_load() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[mirror]]
name = "broken"
source_url = "https://example.org/"
bucket_name = "b"
fingerprint = "blake3"
"#
    )
    .unwrap();

    let err = PipelineConfig::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("identity_tag"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(PipelineConfig::load(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_overlapping_mirrors_fail_load() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[mirror]]
name = "bls-pr"
source_url = "https://download.example.gov/pub/time.series/pr/"
bucket_name = "rearc-data"
bucket_prefix = "bls/pr"

[[mirror]]
name = "everything"
source_url = "https://download.example.gov/pub/time.series/"
bucket_name = "rearc-data"
"#
    )
    .unwrap();

    let err = PipelineConfig::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("overlap"));
}
