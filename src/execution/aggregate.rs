/// Grouped aggregation with mergeable partial state
///
/// Every batch contributes unscaled (count, sum) pairs per group. Scale
/// correction happens once, in `finalize`, and only for COUNT and SUM, so
/// AVG = sum / count is never skewed by the sampling rate.
use crate::error::{EngineError, EngineResult};
use crate::execution::result::ResultRow;
use crate::query::{AggregateKind, StructuredQuery};
use crate::storage::columnar::ColumnarBatch;
use crate::storage::value::{GroupKey, Value};
use fxhash::FxHashMap;

/// Running accumulators for one group
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AggregateState {
    pub count: u64,
    pub sum: f64,
}

impl AggregateState {
    pub fn merge(&mut self, other: &AggregateState) {
        self.count += other.count;
        self.sum += other.sum;
    }

    pub fn finalize(&self, kind: AggregateKind, scale: f64) -> f64 {
        match kind {
            AggregateKind::Count => self.count as f64 * scale,
            AggregateKind::Sum => self.sum * scale,
            AggregateKind::Avg => {
                if self.count == 0 {
                    f64::NAN
                } else {
                    self.sum / self.count as f64
                }
            }
        }
    }
}

/// Per-group state for one query run, in first-seen group order
#[derive(Clone, Debug, Default)]
pub struct PartialAggregate {
    groups: Vec<(GroupKey, AggregateState)>,
    index: FxHashMap<GroupKey, usize>,
}

impl PartialAggregate {
    /// Ungrouped queries start with their single scalar group so they always emit a row
    pub fn new(query: &StructuredQuery) -> Self {
        let mut partial = Self::default();
        if query.is_scalar() {
            partial.entry(GroupKey::scalar());
        }
        partial
    }

    fn entry(&mut self, key: GroupKey) -> &mut AggregateState {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.groups.len();
                self.index.insert(key.clone(), idx);
                self.groups.push((key, AggregateState::default()));
                idx
            }
        };
        &mut self.groups[idx].1
    }

    /// Combine another partial into this one. Counts add and sums add, so the
    /// result does not depend on how rows were split between the two.
    pub fn merge(&mut self, other: PartialAggregate) {
        for (key, state) in other.groups {
            self.entry(key).merge(&state);
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&AggregateState> {
        self.index.get(key).map(|&idx| &self.groups[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &AggregateState)> {
        self.groups.iter().map(|(k, s)| (k, s))
    }
}

/// Indices of the rows that satisfy the WHERE clause
pub fn filter_rows(batch: &ColumnarBatch, query: &StructuredQuery) -> EngineResult<Vec<usize>> {
    let Some(clause) = &query.where_clause else {
        return Ok((0..batch.row_count).collect());
    };
    let col = batch.column_index(&clause.column)?;
    let values = &batch.columns[col];
    Ok(values
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            v.compare_literal(&clause.literal)
                .map(|ord| clause.operator.accepts(ord))
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect())
}

pub fn apply_filter(batch: &ColumnarBatch, query: &StructuredQuery) -> EngineResult<ColumnarBatch> {
    if query.where_clause.is_none() {
        return Ok(batch.clone());
    }
    let rows = filter_rows(batch, query)?;
    Ok(batch.take(&rows))
}

/// Fold the given rows of `batch` into `state`
pub fn merge_rows(
    state: &mut PartialAggregate,
    batch: &ColumnarBatch,
    query: &StructuredQuery,
    rows: &[usize],
) -> EngineResult<()> {
    let key_cols = query
        .grouping_columns()
        .iter()
        .map(|c| batch.column_index(c))
        .collect::<EngineResult<Vec<_>>>()?;
    let agg_col = query
        .aggregate_column
        .as_ref()
        .map(|c| batch.column_index(c))
        .transpose()?;

    for &row in rows {
        let key = GroupKey(key_cols.iter().map(|&c| batch.value(c, row).clone()).collect());
        let entry = state.entry(key);

        let Some(col) = agg_col else {
            entry.count += 1;
            continue;
        };
        match (query.aggregate, batch.value(col, row)) {
            (_, Value::Null) => {}
            (AggregateKind::Count, _) => entry.count += 1,
            (AggregateKind::Sum | AggregateKind::Avg, Value::Int64(v)) => {
                entry.count += 1;
                entry.sum += *v as f64;
            }
            (AggregateKind::Sum | AggregateKind::Avg, Value::Float64(v)) => {
                entry.count += 1;
                entry.sum += *v;
            }
            (AggregateKind::Sum | AggregateKind::Avg, other) => {
                let column = query.aggregate_column.clone().unwrap_or_default();
                return Err(EngineError::Schema {
                    message: format!(
                        "{} needs numeric values, found {} '{}'",
                        query.aggregate_label(),
                        other.type_name(),
                        other
                    ),
                    column: Some(column),
                    source_name: Some(query.source.clone()),
                });
            }
        }
    }
    Ok(())
}

/// Filter a batch and fold every surviving row into `state`
pub fn merge_partial(
    state: &mut PartialAggregate,
    batch: &ColumnarBatch,
    query: &StructuredQuery,
) -> EngineResult<()> {
    let rows = filter_rows(batch, query)?;
    merge_rows(state, batch, query, &rows)
}

/// Emit one result row per group, scaling COUNT and SUM by `scale`
pub fn finalize(
    state: &PartialAggregate,
    query: &StructuredQuery,
    scale: f64,
) -> EngineResult<Vec<ResultRow>> {
    let label = query.aggregate_label();
    state
        .iter()
        .map(|(key, acc)| {
            let mut builder = ResultRow::builder();
            for (name, value) in query.select_columns.iter().zip(key.values()) {
                builder = builder.group(name.clone(), value.clone())?;
            }
            builder.aggregate(label.clone(), acc.finalize(query.aggregate, scale))
        })
        .collect()
}

/// Filter, group and aggregate a whole batch in one pass
pub fn aggregate(
    batch: &ColumnarBatch,
    query: &StructuredQuery,
    scale: f64,
) -> EngineResult<Vec<ResultRow>> {
    let mut state = PartialAggregate::new(query);
    merge_partial(&mut state, batch, query)?;
    finalize(&state, query, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    fn sales() -> ColumnarBatch {
        ColumnarBatch::from_rows(
            &["city", "amount"],
            vec![
                vec![Value::from("Delhi"), Value::Int64(10)],
                vec![Value::from("Delhi"), Value::Int64(20)],
                vec![Value::from("Mumbai"), Value::Int64(5)],
                vec![Value::from("Mumbai"), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_grouped_sum() {
        let q = parse_query("SELECT city, SUM(amount) FROM t GROUP BY city").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("city"), Some(&Value::from("Delhi")));
        assert_eq!(rows[0].get("SUM(amount)"), Some(&Value::Float64(30.0)));
        assert_eq!(rows[1].get("SUM(amount)"), Some(&Value::Float64(5.0)));
    }

    #[test]
    fn test_count_column_skips_missing() {
        let q = parse_query("SELECT COUNT(amount) FROM t").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows[0].aggregate_value(), Some(&Value::Float64(3.0)));

        let q = parse_query("SELECT COUNT(*) FROM t").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows[0].aggregate_value(), Some(&Value::Float64(4.0)));
    }

    #[test]
    fn test_scale_applies_to_count_and_sum_only() {
        let q = parse_query("SELECT SUM(amount) FROM t").unwrap();
        let rows = aggregate(&sales(), &q, 10.0).unwrap();
        assert_eq!(rows[0].aggregate_value(), Some(&Value::Float64(350.0)));

        let q = parse_query("SELECT AVG(amount) FROM t").unwrap();
        let rows = aggregate(&sales(), &q, 10.0).unwrap();
        assert_eq!(rows[0].aggregate_value(), Some(&Value::Float64(35.0 / 3.0)));
    }

    #[test]
    fn test_avg_merge_matches_concatenation() {
        let q = parse_query("SELECT city, AVG(amount) FROM t GROUP BY city").unwrap();
        let batch = sales();

        let mut left = PartialAggregate::new(&q);
        merge_partial(&mut left, &batch.slice(0, 1), &q).unwrap();
        let mut right = PartialAggregate::new(&q);
        merge_partial(&mut right, &batch.slice(1, 3), &q).unwrap();
        left.merge(right);

        let merged = finalize(&left, &q, 1.0).unwrap();
        let direct = aggregate(&batch, &q, 1.0).unwrap();
        assert_eq!(merged, direct);
        assert_eq!(merged[0].get("AVG(amount)"), Some(&Value::Float64(15.0)));
    }

    #[test]
    fn test_where_filters_before_grouping() {
        let q = parse_query("SELECT city, COUNT(*) FROM t WHERE amount >= 10 GROUP BY city").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("COUNT(*)"), Some(&Value::Float64(2.0)));
    }

    #[test]
    fn test_missing_values_never_match() {
        let q = parse_query("SELECT COUNT(*) FROM t WHERE amount != 10").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows[0].aggregate_value(), Some(&Value::Float64(2.0)));
    }

    #[test]
    fn test_quoted_literal_on_text_column() {
        let q = parse_query("SELECT COUNT(*) FROM t WHERE city = 'Delhi'").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows[0].aggregate_value(), Some(&Value::Float64(2.0)));
    }

    #[test]
    fn test_empty_scalar_emits_defined_values() {
        let q = parse_query("SELECT AVG(amount) FROM t WHERE amount > 1000").unwrap();
        let rows = aggregate(&sales(), &q, 1.0).unwrap();
        assert_eq!(rows.len(), 1);
        match rows[0].aggregate_value() {
            Some(Value::Float64(v)) => assert!(v.is_nan()),
            other => panic!("unexpected {:?}", other),
        }

        let q = parse_query("SELECT city, AVG(amount) FROM t WHERE amount > 1000 GROUP BY city").unwrap();
        assert!(aggregate(&sales(), &q, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_grouped_avg_over_only_missing_values_is_nan() {
        let mut batch = sales();
        let pune = ColumnarBatch::new(
            vec![vec![Value::from("Pune")], vec![Value::Null]],
            batch.schema.clone(),
        )
        .unwrap();
        batch.append(pune).unwrap();

        let q = parse_query("SELECT city, AVG(amount) FROM t GROUP BY city").unwrap();
        let rows = aggregate(&batch, &q, 1.0).unwrap();
        assert_eq!(rows.len(), 3);
        let row = rows
            .iter()
            .find(|r| r.get("city") == Some(&Value::from("Pune")))
            .unwrap();
        match row.get("AVG(amount)") {
            Some(Value::Float64(v)) => assert!(v.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            serde_json::to_string(row).unwrap(),
            r#"{"city":"Pune","AVG(amount)":null}"#
        );
    }

    #[test]
    fn test_sum_over_text_is_schema_error() {
        let q = parse_query("SELECT SUM(city) FROM t").unwrap();
        let err = aggregate(&sales(), &q, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::Schema { .. }));
    }

    #[test]
    fn test_missing_group_column_is_schema_error() {
        let q = parse_query("SELECT region, COUNT(*) FROM t GROUP BY region").unwrap();
        let err = aggregate(&sales(), &q, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::Schema { .. }));
    }
}
