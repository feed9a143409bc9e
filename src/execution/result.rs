/// Result rows and the query response shape
use crate::error::{EngineError, EngineResult};
use crate::execution::engine::ExecutionMode;
use crate::storage::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One output row: grouping fields in select order followed by the aggregate field
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    fields: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn builder() -> ResultRowBuilder {
        ResultRowBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Grouping values, excluding the trailing aggregate
    pub fn group_values(&self) -> &[(String, Value)] {
        &self.fields[..self.fields.len().saturating_sub(1)]
    }

    /// The aggregate is always the last field
    pub fn aggregate_value(&self) -> Option<&Value> {
        self.fields.last().map(|(_, v)| v)
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Builds a row field by field, rejecting clashing field names
#[derive(Default)]
pub struct ResultRowBuilder {
    fields: Vec<(String, Value)>,
}

impl ResultRowBuilder {
    fn push(&mut self, name: String, value: Value) -> EngineResult<()> {
        if self.fields.iter().any(|(n, _)| *n == name) {
            return Err(EngineError::semantic(format!(
                "result field '{}' appears more than once",
                name
            )));
        }
        self.fields.push((name, value));
        Ok(())
    }

    pub fn group(mut self, name: impl Into<String>, value: Value) -> EngineResult<Self> {
        self.push(name.into(), value)?;
        Ok(self)
    }

    /// Add the aggregate field and finish the row
    pub fn aggregate(mut self, name: impl Into<String>, value: f64) -> EngineResult<ResultRow> {
        self.push(name.into(), Value::Float64(value))?;
        Ok(ResultRow { fields: self.fields })
    }
}

/// Exact-mode result attached for side-by-side comparison
#[derive(Clone, Debug, serde::Serialize)]
pub struct ExactComparison {
    pub elapsed_seconds: f64,
    pub result: Vec<ResultRow>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct QueryResponse {
    pub mode: ExecutionMode,
    pub elapsed_seconds: f64,
    pub result: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<ExactComparison>,
}
