//! Row sources
//!
//! A row source hands the engine either a fully materialized table or a lazy,
//! restartable sequence of bounded-size batches. Requested columns that do not
//! exist fail with a schema error when the source is opened for reading.

pub mod csv_source;
pub mod memory;
pub mod parquet_source;
pub mod schema_inference;

pub use csv_source::CsvSource;
pub use memory::{MemoryCatalog, MemorySource};
pub use parquet_source::ParquetSource;
pub use schema_inference::SchemaInference;

use crate::config::IngestionConfig;
use crate::error::EngineResult;
use crate::execution::batch::BatchIterator;
use crate::storage::columnar::ColumnarBatch;
use std::path::Path;

pub trait RowSource: Send + Sync {
    /// Identifier used in logs and errors
    fn name(&self) -> String;

    /// Materialize the whole source. `None` reads every column.
    fn load_table(&self, columns: Option<&[String]>) -> EngineResult<ColumnarBatch>;

    /// Start a new pass over the source in batches of at most `batch_size` rows
    fn batches(&self, columns: Option<&[String]>, batch_size: usize) -> EngineResult<Box<dyn BatchIterator>>;
}

/// Resolves the source identifier of a query to a row source
pub trait SourceCatalog: Send + Sync {
    fn open(&self, source: &str) -> EngineResult<Box<dyn RowSource>>;
}

/// Catalog that treats source identifiers as file paths
#[derive(Clone, Debug, Default)]
pub struct FileCatalog {
    options: IngestionConfig,
}

impl FileCatalog {
    pub fn new(options: IngestionConfig) -> Self {
        Self { options }
    }
}

impl SourceCatalog for FileCatalog {
    fn open(&self, source: &str) -> EngineResult<Box<dyn RowSource>> {
        let is_parquet = Path::new(source)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("parquet"))
            .unwrap_or(false);
        if is_parquet {
            Ok(Box::new(ParquetSource::new(source)))
        } else {
            Ok(Box::new(CsvSource::new(source, self.options.clone())))
        }
    }
}
