/// CSV row source
/// Streams typed batches from a delimited text file with column pruning
use crate::config::IngestionConfig;
use crate::error::{EngineError, EngineResult};
use crate::execution::batch::{collect_batches, BatchIterator};
use crate::ingestion::schema_inference::{parse_field, SchemaInference};
use crate::ingestion::RowSource;
use crate::storage::columnar::{schema_from_columns, ColumnType, ColumnarBatch};
use crate::storage::value::Value;
use arrow::datatypes::SchemaRef;
use csv::{Reader, ReaderBuilder, StringRecord};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Batch size used when materializing a whole table
const LOAD_CHUNK_ROWS: usize = 64 * 1024;

pub struct CsvSource {
    path: PathBuf,
    options: IngestionConfig,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, options: IngestionConfig) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_name(&self) -> String {
        self.path.display().to_string()
    }

    fn open_reader(&self) -> EngineResult<Reader<File>> {
        let delimiter = u8::try_from(self.options.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                let message = format!(
                    "CSV delimiter must be a single ASCII character, got {:?}",
                    self.options.delimiter
                );
                EngineError::config_for(message, "ingestion.delimiter")
            })?;
        let file = File::open(&self.path).map_err(|e| {
            EngineError::io_with_path(format!("cannot open CSV: {}", e), self.display_name())
        })?;
        Ok(ReaderBuilder::new()
            .has_headers(self.options.has_headers)
            .delimiter(delimiter)
            .flexible(false)
            .from_reader(file))
    }

    /// Open a fresh pass over the file
    fn open(&self, columns: Option<&[String]>, batch_size: usize) -> EngineResult<CsvBatchIterator> {
        let mut reader = self.open_reader()?;

        let headers: Vec<String> = if self.options.has_headers {
            reader
                .headers()
                .map_err(|e| {
                    EngineError::io_with_path(format!("cannot read CSV header: {}", e), self.display_name())
                })?
                .iter()
                .map(|h| h.to_string())
                .collect()
        } else {
            Vec::new()
        };

        // Without headers, columns are addressed as column_0, column_1, ...
        let mut sample: VecDeque<StringRecord> = VecDeque::new();
        let inference = SchemaInference::new(self.options.schema_sample_rows);
        for record in reader.records().take(inference.sample_rows()) {
            sample.push_back(record?);
        }
        let headers = if self.options.has_headers {
            headers
        } else {
            let width = sample.front().map(|r| r.len()).unwrap_or(0);
            (0..width).map(|i| format!("column_{}", i)).collect()
        };

        let projection: Vec<usize> = match columns {
            Some(names) => names
                .iter()
                .map(|name| {
                    headers
                        .iter()
                        .position(|h| h == name)
                        .ok_or_else(|| EngineError::missing_column(name.clone(), self.display_name()))
                })
                .collect::<EngineResult<_>>()?,
            None => (0..headers.len()).collect(),
        };

        let typed: Vec<(String, ColumnType)> = projection
            .iter()
            .map(|&idx| {
                let ty = inference.infer_column(sample.iter().map(|r| r.get(idx).unwrap_or("")));
                (headers[idx].clone(), ty)
            })
            .collect();
        let types = typed.iter().map(|(_, ty)| *ty).collect();

        tracing::debug!(
            "Opened CSV '{}' with {} of {} columns, schema {:?}",
            self.display_name(),
            projection.len(),
            headers.len(),
            typed
        );

        Ok(CsvBatchIterator {
            reader,
            schema: schema_from_columns(&typed),
            projection,
            types,
            pending: sample,
            batch_size: batch_size.max(1),
            finished: false,
            path: self.display_name(),
        })
    }
}

impl RowSource for CsvSource {
    fn name(&self) -> String {
        self.display_name()
    }

    fn load_table(&self, columns: Option<&[String]>) -> EngineResult<ColumnarBatch> {
        let iter = self.open(columns, LOAD_CHUNK_ROWS)?;
        collect_batches(Box::new(iter))
    }

    fn batches(&self, columns: Option<&[String]>, batch_size: usize) -> EngineResult<Box<dyn BatchIterator>> {
        Ok(Box::new(self.open(columns, batch_size)?))
    }
}

pub struct CsvBatchIterator {
    reader: Reader<File>,
    schema: SchemaRef,
    /// Record field index for each output column
    projection: Vec<usize>,
    types: Vec<ColumnType>,
    /// Records consumed for schema inference that have not been emitted yet
    pending: VecDeque<StringRecord>,
    batch_size: usize,
    finished: bool,
    path: String,
}

impl CsvBatchIterator {
    fn push_record(&self, record: &StringRecord, columns: &mut [Vec<Value>]) -> EngineResult<()> {
        for ((col, &field_idx), &ty) in columns.iter_mut().zip(&self.projection).zip(&self.types) {
            let raw = record.get(field_idx).ok_or_else(|| {
                EngineError::io_with_path(
                    format!("record has {} fields, expected at least {}", record.len(), field_idx + 1),
                    self.path.clone(),
                )
            })?;
            col.push(parse_field(raw, ty));
        }
        Ok(())
    }
}

impl BatchIterator for CsvBatchIterator {
    fn next(&mut self) -> EngineResult<Option<ColumnarBatch>> {
        if self.finished {
            return Ok(None);
        }

        let capacity = self.batch_size.min(LOAD_CHUNK_ROWS);
        let mut columns: Vec<Vec<Value>> = self.projection.iter().map(|_| Vec::with_capacity(capacity)).collect();
        let mut rows = 0;

        while rows < self.batch_size {
            if let Some(record) = self.pending.pop_front() {
                self.push_record(&record, &mut columns)?;
                rows += 1;
                continue;
            }
            let mut record = StringRecord::new();
            if !self.reader.read_record(&mut record)? {
                self.finished = true;
                break;
            }
            self.push_record(&record, &mut columns)?;
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }
        let mut batch = ColumnarBatch::new(columns, self.schema.clone())?;
        // Zero projected columns still carry a row count
        batch.row_count = rows;
        Ok(Some(batch))
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
