use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::model::Product;

/// CSV record sink, UTF-8, one row per admitted product.
///
/// Rows are flushed as they are written, so an interrupted crawl still
/// leaves every emitted record on disk. The header comes from the
/// `Product` field order.
pub struct CsvSink {
    writer: Writer<File>,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self> {
        let writer =
            Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, product: &Product) -> Result<()> {
        self.writer.serialize(product)?;
        self.writer.flush()?;
        Ok(())
    }
}

// ── Tests ──
