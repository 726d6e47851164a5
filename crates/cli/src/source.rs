use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use storefront_core::source::{
    decode_snapshot, AnalysisScope, SourceError, TransactionSnapshot, TransactionSource,
};

/// Serves one exported snapshot file; the export is already tenant-scoped,
/// so every scope sees the same records.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TransactionSource for JsonFileSource {
    async fn fetch_transactions(
        &self,
        _scope: &AnalysisScope,
    ) -> Result<TransactionSnapshot, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|error| {
            let detail = format!("{}: {error}", self.path.display());
            match error.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    SourceError::Unavailable(detail)
                }
                _ => SourceError::Io(detail),
            }
        })?;
        decode_snapshot(&raw)
    }
}
