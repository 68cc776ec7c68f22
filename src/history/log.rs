use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self as async_fs, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use crate::error::{Error, Result};
use crate::types::expiry::ExpirySelector;
use crate::types::instrument::Instrument;
use crate::types::metrics::DerivedMetrics;
use crate::types::series_key::SeriesKey;

pub const LOG_RECORD_VERSION: u32 = 1;

/// One durable row: a committed record tagged with its series key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub version: u32,
    pub instrument: Instrument,
    pub expiry_selector: ExpirySelector,
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
}

impl LogRecord {
    pub fn new(key: SeriesKey, metrics: DerivedMetrics) -> Self {
        LogRecord {
            version: LOG_RECORD_VERSION,
            instrument: key.instrument,
            expiry_selector: key.expiry,
            metrics,
        }
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.instrument, self.expiry_selector)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self> {
        let record: LogRecord = serde_json::from_str(line)
            .map_err(|e| Error::DeserializationError(e.to_string()))?;

        if record.version > LOG_RECORD_VERSION {
            return Err(Error::UnsupportedRecordVersion {
                record_version: record.version,
                max_supported: LOG_RECORD_VERSION,
            });
        }

        Ok(record)
    }
}

/// Everything readable from a log, in write order.
#[derive(Debug, Default)]
pub struct Replay {
    pub records: Vec<LogRecord>,
    pub skipped: usize,
}

/// Append-only store of every committed record across all keys.
#[async_trait]
pub trait MetricsLog: Send + Sync {
    /// Returns once the record is durable.
    async fn append(&self, record: &LogRecord) -> Result<()>;
    async fn replay(&self) -> Result<Replay>;
}

/// JSON Lines file, one [`LogRecord`] per line.
///
/// ## Durability
/// - Every append is flushed and `fsync`ed (`sync_data`) before returning
/// - Writes are serialised through an async mutex; lines never interleave
/// - A torn line, left by a crash or by a failed append, is terminated before
///   the next record is written; the torn line itself is skipped on replay
///
/// ## Replay
/// - A missing file is an empty log
/// - Undecodable lines (bad UTF-8, bad JSON, newer record versions) are
///   skipped with a warning
pub struct JsonLinesLog {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl JsonLinesLog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent).await?;
            }
        }

        let torn = !ends_with_newline(&path).await?;
        if torn {
            tracing::warn!("Torn final line in {:?}; terminating before next append", path);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!("Opened metrics log at {:?}", path);
        Ok(JsonLinesLog {
            path,
            writer: Mutex::new(LineWriter { sink: file, torn }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetricsLog for JsonLinesLog {
    async fn append(&self, record: &LogRecord) -> Result<()> {
        let line = record.encode()?;

        let mut writer = self.writer.lock().await;
        writer.write_line(&line).await?;
        if let Err(e) = writer.sink.sync_data().await {
            writer.torn = true;
            return Err(e.into());
        }
        Ok(())
    }

    async fn replay(&self) -> Result<Replay> {
        let body = match async_fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };

        Ok(decode_lines(&body, &self.path))
    }
}

/// Newline-delimited writer that remembers whether the last line made it out whole.
struct LineWriter<W> {
    sink: W,
    torn: bool,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    async fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.torn {
            self.sink.write_all(b"\n").await?;
            self.torn = false;
        }

        let written = async {
            self.sink.write_all(line).await?;
            self.sink.flush().await
        }
        .await;

        // A partial write may have reached the file; an extra blank line is harmless
        if written.is_err() {
            self.torn = true;
        }
        written
    }
}

fn decode_lines(body: &[u8], path: &Path) -> Replay {
    let mut replay = Replay::default();
    for (index, raw) in body.split(|b| *b == b'\n').enumerate() {
        let decoded = match std::str::from_utf8(raw) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => LogRecord::decode(line),
            Err(e) => Err(Error::DeserializationError(e.to_string())),
        };

        match decoded {
            Ok(record) => replay.records.push(record),
            Err(e) => {
                tracing::warn!("Skipping line {} of {:?}: {}", index + 1, path, e);
                replay.skipped += 1;
            }
        }
    }
    replay
}

async fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };

    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }

    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

/// Volatile log for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl MetricsLog for MemoryLog {
    async fn append(&self, record: &LogRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn replay(&self) -> Result<Replay> {
        Ok(Replay {
            records: self.records.lock().await.clone(),
            skipped: 0,
        })
    }
}
