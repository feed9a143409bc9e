/// In-memory row source and catalog
/// Serves registered tables by name, used by embedders and tests
use crate::error::{EngineError, EngineResult};
use crate::execution::batch::BatchIterator;
use crate::ingestion::{RowSource, SourceCatalog};
use crate::storage::columnar::ColumnarBatch;
use arrow::datatypes::SchemaRef;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct MemorySource {
    name: String,
    table: Arc<ColumnarBatch>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, table: ColumnarBatch) -> Self {
        Self {
            name: name.into(),
            table: Arc::new(table),
        }
    }

    fn projected(&self, columns: Option<&[String]>) -> EngineResult<ColumnarBatch> {
        let Some(names) = columns else {
            return Ok((*self.table).clone());
        };
        if let Some(missing) = names.iter().find(|n| self.table.schema.index_of(n).is_err()) {
            return Err(EngineError::missing_column(missing.clone(), self.name.clone()));
        }
        self.table.project(names)
    }
}

impl RowSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load_table(&self, columns: Option<&[String]>) -> EngineResult<ColumnarBatch> {
        self.projected(columns)
    }

    fn batches(&self, columns: Option<&[String]>, batch_size: usize) -> EngineResult<Box<dyn BatchIterator>> {
        let table = self.projected(columns)?;
        Ok(Box::new(MemoryBatchIterator {
            table,
            offset: 0,
            batch_size: batch_size.max(1),
        }))
    }
}

struct MemoryBatchIterator {
    table: ColumnarBatch,
    offset: usize,
    batch_size: usize,
}

impl BatchIterator for MemoryBatchIterator {
    fn next(&mut self) -> EngineResult<Option<ColumnarBatch>> {
        if self.offset >= self.table.row_count {
            return Ok(None);
        }
        let mut batch = self.table.slice(self.offset, self.batch_size);
        let rows = self.batch_size.min(self.table.row_count - self.offset);
        batch.row_count = rows;
        self.offset += rows;
        Ok(Some(batch))
    }

    fn schema(&self) -> SchemaRef {
        self.table.schema.clone()
    }
}

/// Catalog of named in-memory tables
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, MemorySource>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, table: ColumnarBatch) {
        let name = name.into();
        self.tables.insert(name.clone(), MemorySource::new(name, table));
    }

    pub fn with_table(mut self, name: impl Into<String>, table: ColumnarBatch) -> Self {
        self.register(name, table);
        self
    }
}

impl SourceCatalog for MemoryCatalog {
    fn open(&self, source: &str) -> EngineResult<Box<dyn RowSource>> {
        self.tables
            .get(source)
            .map(|s| Box::new(s.clone()) as Box<dyn RowSource>)
            .ok_or_else(|| EngineError::io_with_path("table is not registered", source))
    }
}
