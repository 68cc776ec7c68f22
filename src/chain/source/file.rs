use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::fs as async_fs;
use crate::chain::RawSnapshot;
use crate::chain::source::SnapshotSource;
use crate::error::{Error, Result};
use crate::types::instrument::Instrument;

/// Serves chain documents saved on disk as `{dir}/{SYMBOL}.json`.
///
/// The file is re-read on every fetch, so an external downloader can keep
/// overwriting it while the scheduler polls.
pub struct FileSnapshotSource {
    dir: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        FileSnapshotSource {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, instrument: Instrument) -> PathBuf {
        self.dir.join(format!("{}.json", instrument.symbol()))
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch(&self, instrument: Instrument) -> Result<RawSnapshot> {
        let path = self.path_for(instrument);
        let body = async_fs::read_to_string(&path)
            .await
            .map_err(|e| Error::TransportFailure(format!("{}: {}", path.display(), e)))?;

        RawSnapshot::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_document_for_symbol() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("BANKNIFTY.json"),
            r#"{"records": {"underlyingValue": 48012.5, "timestamp": "16-Oct-2026 10:00:00", "data": []}}"#,
        )
        .expect("write");

        let source = FileSnapshotSource::new(dir.path());
        let snapshot = source.fetch(Instrument::BankNifty).await.expect("fetch");
        assert_eq!(snapshot.underlying_value, Some(48012.5));
    }

    #[tokio::test]
    async fn missing_file_is_transport_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FileSnapshotSource::new(dir.path());
        let err = source.fetch(Instrument::Nifty).await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure(_)));
    }

    #[tokio::test]
    async fn garbage_file_is_parse_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("NIFTY.json"), "Resource not found").expect("write");
        let source = FileSnapshotSource::new(dir.path());
        let err = source.fetch(Instrument::Nifty).await.unwrap_err();
        assert!(matches!(err, Error::ParseFailure(_)));
    }
}
