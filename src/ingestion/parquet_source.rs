/// Parquet row source
/// Reads arrow record batches with a root-column projection mask and converts them
/// into tagged-value batches
use crate::error::{EngineError, EngineResult};
use crate::execution::batch::{collect_batches, BatchIterator};
use crate::ingestion::RowSource;
use crate::storage::columnar::{schema_from_columns, ColumnType, ColumnarBatch};
use crate::storage::value::Value;
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use std::fs::File;
use std::path::PathBuf;

const LOAD_CHUNK_ROWS: usize = 64 * 1024;

pub struct ParquetSource {
    path: PathBuf,
}

impl ParquetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn display_name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self, columns: Option<&[String]>, batch_size: usize) -> EngineResult<ParquetBatchIterator> {
        let file = File::open(&self.path).map_err(|e| {
            EngineError::io_with_path(format!("cannot open Parquet file: {}", e), self.display_name())
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let file_schema = builder.schema().clone();

        let names: Vec<String> = match columns {
            Some(names) => names.to_vec(),
            None => file_schema.fields().iter().map(|f| f.name().clone()).collect(),
        };
        let mut indices = Vec::with_capacity(names.len());
        let mut typed = Vec::with_capacity(names.len());
        for name in &names {
            let idx = file_schema
                .index_of(name)
                .map_err(|_| EngineError::missing_column(name.clone(), self.display_name()))?;
            indices.push(idx);
            typed.push((name.clone(), ColumnType::from_data_type(file_schema.field(idx).data_type())));
        }

        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(batch_size.max(1))
            .build()?;

        tracing::debug!(
            "Opened Parquet '{}' projecting {} of {} columns",
            self.display_name(),
            names.len(),
            file_schema.fields().len()
        );

        Ok(ParquetBatchIterator {
            reader,
            names,
            schema: schema_from_columns(&typed),
        })
    }
}

impl RowSource for ParquetSource {
    fn name(&self) -> String {
        self.display_name()
    }

    fn load_table(&self, columns: Option<&[String]>) -> EngineResult<ColumnarBatch> {
        collect_batches(Box::new(self.open(columns, LOAD_CHUNK_ROWS)?))
    }

    fn batches(&self, columns: Option<&[String]>, batch_size: usize) -> EngineResult<Box<dyn BatchIterator>> {
        Ok(Box::new(self.open(columns, batch_size)?))
    }
}

pub struct ParquetBatchIterator {
    reader: ParquetRecordBatchReader,
    /// Output column order
    names: Vec<String>,
    schema: SchemaRef,
}

impl ParquetBatchIterator {
    fn convert(&self, record_batch: RecordBatch) -> EngineResult<ColumnarBatch> {
        let mut columns = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let idx = record_batch
                .schema()
                .index_of(name)
                .map_err(|_| EngineError::schema(format!("projected column '{}' missing from batch", name)))?;
            columns.push(array_values(record_batch.column(idx))?);
        }
        let mut batch = ColumnarBatch::new(columns, self.schema.clone())?;
        batch.row_count = record_batch.num_rows();
        Ok(batch)
    }
}

impl BatchIterator for ParquetBatchIterator {
    fn next(&mut self) -> EngineResult<Option<ColumnarBatch>> {
        match self.reader.next() {
            Some(record_batch) => Ok(Some(self.convert(record_batch?)?)),
            None => Ok(None),
        }
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

/// Convert an arrow array into tagged values: integers widen to i64, floats to f64,
/// everything else is rendered as a string
fn array_values(array: &ArrayRef) -> EngineResult<Vec<Value>> {
    let values = match ColumnType::from_data_type(array.data_type()) {
        ColumnType::Integer => {
            let ints = cast(array, &DataType::Int64)?;
            ints.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map(Value::Int64).unwrap_or(Value::Null))
                .collect()
        }
        ColumnType::Float => {
            let floats = cast(array, &DataType::Float64)?;
            floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| match v {
                    Some(f) if !f.is_nan() => Value::Float64(f),
                    _ => Value::Null,
                })
                .collect()
        }
        ColumnType::Text => {
            let strings = cast(array, &DataType::Utf8)?;
            strings
                .as_string::<i32>()
                .iter()
                .map(|v| v.map(|s| Value::String(s.to_string())).unwrap_or(Value::Null))
                .collect()
        }
    };
    Ok(values)
}
