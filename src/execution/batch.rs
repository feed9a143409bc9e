use crate::error::EngineResult;
use crate::storage::columnar::ColumnarBatch;
use arrow::datatypes::SchemaRef;

/// Batch iterator - produces batches of rows from a row source
/// At most one batch is materialized at a time
pub trait BatchIterator: Send {
    /// Get next batch; `None` once the source is exhausted
    fn next(&mut self) -> EngineResult<Option<ColumnarBatch>>;

    /// Get schema of the produced batches
    fn schema(&self) -> SchemaRef;
}

/// Drain an iterator into one batch
pub fn collect_batches(mut iter: Box<dyn BatchIterator>) -> EngineResult<ColumnarBatch> {
    let mut table = ColumnarBatch::empty(iter.schema());
    while let Some(batch) = iter.next()? {
        table.append(batch)?;
    }
    Ok(table)
}
