use crate::error::{EngineError, EngineResult};
use crate::storage::value::Value;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

/// Column type as observed in the row source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn to_data_type(self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Text => DataType::Utf8,
        }
    }

    pub fn from_data_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Integer,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnType::Float,
            _ => ColumnType::Text,
        }
    }

    /// Type observed for a single value; missing values carry no type
    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int64(_) => Some(ColumnType::Integer),
            Value::Float64(_) => Some(ColumnType::Float),
            Value::String(_) => Some(ColumnType::Text),
            Value::Null => None,
        }
    }
}

/// Build an arrow schema from (name, type) pairs
pub fn schema_from_columns(columns: &[(String, ColumnType)]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, ty)| Field::new(name, ty.to_data_type(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Columnar batch - a batch of rows as one vector of tagged values per column
/// The schema provides the stable column-name -> index mapping for the batch
#[derive(Clone, Debug)]
pub struct ColumnarBatch {
    /// Column values (one vector per column, all of equal length)
    pub columns: Vec<Vec<Value>>,

    /// Schema describing the columns
    pub schema: SchemaRef,

    /// Number of rows in this batch
    pub row_count: usize,
}

impl ColumnarBatch {
    pub fn new(columns: Vec<Vec<Value>>, schema: SchemaRef) -> EngineResult<Self> {
        if columns.len() != schema.fields().len() {
            return Err(EngineError::internal(format!(
                "column count ({}) != schema field count ({})",
                columns.len(),
                schema.fields().len()
            )));
        }
        let row_count = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != row_count) {
            return Err(EngineError::internal(format!(
                "column '{}' has {} rows, expected {}",
                schema.field(i).name(),
                col.len(),
                row_count
            )));
        }

        Ok(Self {
            columns,
            schema,
            row_count,
        })
    }

    /// Build a batch from row-major values, inferring each column's type from its first
    /// non-missing value
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Value>>) -> EngineResult<Self> {
        let mut columns: Vec<Vec<Value>> = names.iter().map(|_| Vec::with_capacity(rows.len())).collect();
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(EngineError::internal(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    names.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }

        let typed: Vec<(String, ColumnType)> = names
            .iter()
            .zip(&columns)
            .map(|(name, col)| {
                let ty = col
                    .iter()
                    .find_map(ColumnType::of_value)
                    .unwrap_or(ColumnType::Text);
                (name.to_string(), ty)
            })
            .collect();

        Self::new(columns, schema_from_columns(&typed))
    }

    /// Create an empty batch with the given schema
    pub fn empty(schema: SchemaRef) -> Self {
        let columns = schema.fields().iter().map(|_| Vec::new()).collect();
        Self {
            columns,
            schema,
            row_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Resolve a column name to its index, failing with a schema error
    pub fn column_index(&self, name: &str) -> EngineResult<usize> {
        self.schema
            .index_of(name)
            .map_err(|_| EngineError::schema(format!("column '{}' not found in batch", name)))
    }

    /// Get a column by name
    pub fn column_by_name(&self, name: &str) -> Option<&[Value]> {
        let idx = self.schema.index_of(name).ok()?;
        self.columns.get(idx).map(|c| c.as_slice())
    }

    pub fn column_type(&self, idx: usize) -> ColumnType {
        ColumnType::from_data_type(self.schema.field(idx).data_type())
    }

    #[inline]
    pub fn value(&self, col: usize, row: usize) -> &Value {
        &self.columns[col][row]
    }

    /// Values of one row, in column order
    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c[row].clone()).collect()
    }

    /// Gather the given rows (in the given order) into a new batch
    pub fn take(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
            .collect();
        Self {
            columns,
            schema: self.schema.clone(),
            row_count: indices.len(),
        }
    }

    /// Append another batch with the same schema
    pub fn append(&mut self, other: ColumnarBatch) -> EngineResult<()> {
        if self.schema.fields() != other.schema.fields() {
            return Err(EngineError::internal("cannot append batches with different schemas"));
        }
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            dst.extend(src);
        }
        self.row_count += other.row_count;
        Ok(())
    }

    /// Slice this batch
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        let end = (offset + length).min(self.row_count);
        let offset = offset.min(end);
        let columns = self
            .columns
            .iter()
            .map(|col| col[offset..end].to_vec())
            .collect();

        Self {
            columns,
            schema: self.schema.clone(),
            row_count: end - offset,
        }
    }

    /// Keep only the named columns, in the given order
    pub fn project(&self, names: &[String]) -> EngineResult<Self> {
        let mut columns = Vec::with_capacity(names.len());
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let idx = self.column_index(name)?;
            columns.push(self.columns[idx].clone());
            fields.push(self.schema.field(idx).clone());
        }
        Ok(Self {
            columns,
            schema: Arc::new(Schema::new(fields)),
            row_count: self.row_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> ColumnarBatch {
        ColumnarBatch::from_rows(
            &["city", "amount"],
            vec![
                vec![Value::from("Delhi"), Value::Int64(10)],
                vec![Value::from("Delhi"), Value::Int64(20)],
                vec![Value::from("Mumbai"), Value::Float64(5.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_infers_types() {
        let batch = sales();
        assert_eq!(batch.row_count, 3);
        assert_eq!(batch.column_type(0), ColumnType::Text);
        assert_eq!(batch.column_type(1), ColumnType::Integer);
    }

    #[test]
    fn test_take_and_slice() {
        let batch = sales();
        let taken = batch.take(&[2, 0]);
        assert_eq!(taken.row_count, 2);
        assert_eq!(taken.value(0, 0), &Value::from("Mumbai"));

        let sliced = batch.slice(1, 10);
        assert_eq!(sliced.row_count, 2);
        assert_eq!(sliced.value(1, 0), &Value::Int64(20));
    }

    #[test]
    fn test_project_missing_column_is_schema_error() {
        let batch = sales();
        let err = batch.project(&["region".to_string()]).unwrap_err();
        assert!(matches!(err, EngineError::Schema { .. }));
    }

    #[test]
    fn test_mismatched_column_lengths_rejected() {
        let schema = schema_from_columns(&[
            ("a".to_string(), ColumnType::Integer),
            ("b".to_string(), ColumnType::Integer),
        ]);
        let result = ColumnarBatch::new(vec![vec![Value::Int64(1)], vec![]], schema);
        assert!(result.is_err());
    }
}
