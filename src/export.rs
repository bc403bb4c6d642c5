//! Dump every stored key/value pair to a text file

use crate::error::{ExportError, Result};
use crate::store::KvStore;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Counts from one export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub keys_found: usize,
    pub exported: usize,
    /// Keys whose value could not be read
    pub skipped: usize,
}

/// Writes `Key: <k>, Value: <v>` lines for every key in the store
pub struct Exporter {
    store: Arc<dyn KvStore>,
}

impl Exporter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// All keys, numeric keys first in ascending order, then the rest lexically
    pub async fn sorted_keys(&self) -> Result<Vec<String>> {
        let mut keys = self.store.keys("*").await?;
        keys.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        });
        Ok(keys)
    }

    /// Create (or truncate) `path` and export into it
    pub async fn export_to_path(&self, path: &Path) -> Result<ExportSummary> {
        let file = File::create(path)
            .map_err(|e| ExportError::FileCreate(format!("{}: {}", path.display(), e)))?;

        let mut writer = BufWriter::new(file);
        let summary = self.export_to_writer(&mut writer).await?;
        writer
            .flush()
            .map_err(|e| ExportError::Write(e.to_string()))?;

        tracing::info!(
            "Exported {} of {} keys to {}",
            summary.exported,
            summary.keys_found,
            path.display()
        );
        Ok(summary)
    }

    /// Export into any writer. A key that cannot be read, or whose line cannot
    /// be written, is logged and counted as skipped.
    pub async fn export_to_writer<W: Write>(&self, writer: &mut W) -> Result<ExportSummary> {
        let keys = self.sorted_keys().await?;
        let mut summary = ExportSummary {
            keys_found: keys.len(),
            ..Default::default()
        };

        for key in &keys {
            let value = match self.store.get(key).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping key {}: {}", key, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Err(e) = writeln!(writer, "Key: {}, Value: {}", key, value) {
                tracing::warn!("Failed to write key {}: {}", key, e);
                summary.skipped += 1;
                continue;
            }
            summary.exported += 1;
        }

        Ok(summary)
    }
}
