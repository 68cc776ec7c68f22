pub mod file;

use async_trait::async_trait;
use crate::chain::RawSnapshot;
use crate::error::Result;
use crate::types::instrument::Instrument;

/// Supplier of raw chain documents. Implementations report
/// `TransportFailure` when the upstream cannot be reached and
/// `ParseFailure` when what came back is not a chain document.
/// The caller owns the timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, instrument: Instrument) -> Result<RawSnapshot>;
}

pub use file::FileSnapshotSource;
