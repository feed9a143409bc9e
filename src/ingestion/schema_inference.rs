//! Schema Inference - Deterministic column typing for delimited text

use crate::storage::columnar::ColumnType;
use crate::storage::value::Value;

/// Schema Inference Engine
///
/// Types a column as integer when every non-empty sampled field parses as i64,
/// float when every one parses as f64, and text otherwise. A column with no
/// non-empty samples is typed as text.
pub struct SchemaInference {
    /// Maximum rows consulted per column
    sample_rows: usize,
}

impl SchemaInference {
    pub fn new(sample_rows: usize) -> Self {
        Self {
            sample_rows: sample_rows.max(1),
        }
    }

    pub fn sample_rows(&self) -> usize {
        self.sample_rows
    }

    /// Infer one column type from sampled raw fields
    pub fn infer_column<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> ColumnType {
        let mut seen_any = false;
        let mut all_int = true;
        let mut all_float = true;

        for field in fields.into_iter().take(self.sample_rows) {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            seen_any = true;
            if all_int && field.parse::<i64>().is_err() {
                all_int = false;
            }
            if !all_int && field.parse::<f64>().is_err() {
                all_float = false;
                break;
            }
        }

        match (seen_any, all_int, all_float) {
            (false, _, _) => ColumnType::Text,
            (true, true, _) => ColumnType::Integer,
            (true, false, true) => ColumnType::Float,
            (true, false, false) => ColumnType::Text,
        }
    }
}

/// Parse one raw field under its column's inferred type.
///
/// Empty fields (and NaN spellings in numeric columns) are missing. A field that does not
/// parse under the column type keeps the widest type it does parse as.
pub fn parse_field(raw: &str, column_type: ColumnType) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match column_type {
        ColumnType::Integer => match trimmed.parse::<i64>() {
            Ok(v) => Value::Int64(v),
            Err(_) => parse_float_or_text(raw, trimmed),
        },
        ColumnType::Float => parse_float_or_text(raw, trimmed),
        ColumnType::Text => Value::String(raw.to_string()),
    }
}

fn parse_float_or_text(raw: &str, trimmed: &str) -> Value {
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_nan() => Value::Null,
        Ok(v) => Value::Float64(v),
        Err(_) => Value::String(raw.to_string()),
    }
}
