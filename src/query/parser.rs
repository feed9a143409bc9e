use crate::error::{EngineError, EngineResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;

/// Whole-statement grammar, matched against whitespace-normalized text.
/// SELECT <items> FROM <source> [WHERE <col> <op> <literal>] [GROUP BY <cols>] [;]
static QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^SELECT (?P<select>.+?) FROM (?P<src>[^ ;]+)(?: WHERE (?P<wcol>[^ <>=!;]+) ?(?P<wop>!=|>=|<=|=|>|<) ?(?P<wval>'[^']*'|"[^"]*"|[^ ;]+))?(?: GROUP BY (?P<gby>.+?))? ?;?$"#,
    )
    .expect("query grammar is a valid regex")
});

static AGGREGATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<func>COUNT|SUM|AVG) ?\( ?(?P<arg>[^()]+?) ?\)$")
        .expect("aggregate grammar is a valid regex")
});

/// Aggregate function in the select list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
}

impl AggregateKind {
    pub fn name(self) -> &'static str {
        match self {
            AggregateKind::Count => "COUNT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Avg => "AVG",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateKind::Count),
            "SUM" => Some(AggregateKind::Sum),
            "AVG" => Some(AggregateKind::Avg),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl FilterOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(FilterOperator::Equals),
            "!=" => Some(FilterOperator::NotEquals),
            ">" => Some(FilterOperator::GreaterThan),
            "<" => Some(FilterOperator::LessThan),
            ">=" => Some(FilterOperator::GreaterThanOrEqual),
            "<=" => Some(FilterOperator::LessThanOrEqual),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            FilterOperator::Equals => "=",
            FilterOperator::NotEquals => "!=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessThan => "<",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThanOrEqual => "<=",
        }
    }

    /// Whether `value <op> literal` holds given their ordering
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FilterOperator::Equals => ordering == Ordering::Equal,
            FilterOperator::NotEquals => ordering != Ordering::Equal,
            FilterOperator::GreaterThan => ordering == Ordering::Greater,
            FilterOperator::LessThan => ordering == Ordering::Less,
            FilterOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            FilterOperator::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// WHERE literal. Parsing stays syntactic: quotes are stripped and the numeric readings
/// are precomputed, but which reading applies is decided per value at evaluation time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Literal {
    text: String,
    quoted: bool,
    #[serde(skip)]
    int_value: Option<i64>,
    #[serde(skip)]
    float_value: Option<f64>,
}

impl Literal {
    pub fn parse(raw: &str) -> Self {
        let bytes = raw.as_bytes();
        let quoted = raw.len() >= 2
            && ((bytes[0] == b'\'' && bytes[raw.len() - 1] == b'\'')
                || (bytes[0] == b'"' && bytes[raw.len() - 1] == b'"'));
        let text = if quoted { &raw[1..raw.len() - 1] } else { raw };
        let trimmed = text.trim();

        Self {
            text: text.to_string(),
            quoted,
            int_value: trimmed.parse::<i64>().ok(),
            float_value: trimmed.parse::<f64>().ok().filter(|f| !f.is_nan()),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.int_value
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.float_value
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WhereClause {
    pub column: String,
    pub operator: FilterOperator,
    pub literal: Literal,
}

/// Validated structured query, built once per request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructuredQuery {
    /// Source identifier (file path or registered table name)
    pub source: String,
    /// Plain grouping columns from the select list, in order
    pub select_columns: Vec<String>,
    pub aggregate: AggregateKind,
    /// None for COUNT(*)
    pub aggregate_column: Option<String>,
    pub where_clause: Option<WhereClause>,
    pub group_by: Vec<String>,
}

impl StructuredQuery {
    /// Columns that form the group key: GROUP BY when present, otherwise the select columns
    pub fn grouping_columns(&self) -> &[String] {
        if self.group_by.is_empty() {
            &self.select_columns
        } else {
            &self.group_by
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.grouping_columns().is_empty()
    }

    /// Output field name of the aggregate, e.g. `COUNT(*)` or `SUM(amount)`
    pub fn aggregate_label(&self) -> String {
        match &self.aggregate_column {
            Some(col) => format!("{}({})", self.aggregate.name(), col),
            None => format!("{}(*)", self.aggregate.name()),
        }
    }

    /// Every column the query reads, deduplicated, in first-reference order
    pub fn required_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = Vec::new();
        let candidates = self
            .grouping_columns()
            .iter()
            .chain(self.aggregate_column.iter())
            .chain(self.where_clause.iter().map(|w| &w.column));
        for c in candidates {
            if !cols.contains(c) {
                cols.push(c.clone());
            }
        }
        cols
    }
}

/// Parse a restricted-SQL aggregate query
pub fn parse_query(sql: &str) -> EngineResult<StructuredQuery> {
    parse_normalized(sql).map_err(|e| e.with_query(sql))
}

fn parse_normalized(sql: &str) -> EngineResult<StructuredQuery> {
    let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let caps = QUERY_RE.captures(&normalized).ok_or_else(|| {
        EngineError::syntax(
            "Unsupported SQL. Examples: SELECT COUNT(*) FROM file.csv; \
             SELECT city, SUM(amount) FROM file.csv GROUP BY city",
        )
    })?;

    let select = caps.name("select").map(|m| m.as_str()).unwrap_or_default();
    let source = caps.name("src").map(|m| m.as_str().to_string()).unwrap_or_default();

    let mut items: Vec<&str> = select.split(',').map(str::trim).collect();
    let aggregate_item = items.pop().unwrap_or_default();
    let (aggregate, aggregate_column) = parse_aggregate(aggregate_item)?;

    let mut select_columns = Vec::with_capacity(items.len());
    for item in items {
        if item.is_empty() {
            return Err(EngineError::syntax("empty item in select list"));
        }
        if AGGREGATE_RE.is_match(item) {
            return Err(EngineError::semantic(format!(
                "only one aggregate is supported and it must be the last select item, found '{}'",
                item
            )));
        }
        if select_columns.iter().any(|c: &String| c.eq_ignore_ascii_case(item)) {
            return Err(EngineError::semantic(format!("column '{}' selected twice", item)));
        }
        select_columns.push(item.to_string());
    }

    let group_by = match caps.name("gby") {
        Some(m) => {
            let cols: Vec<String> = m.as_str().split(',').map(|c| c.trim().to_string()).collect();
            if cols.iter().any(|c| c.is_empty()) {
                return Err(EngineError::syntax("empty column in GROUP BY"));
            }
            cols
        }
        None => Vec::new(),
    };

    if !group_by.is_empty() {
        let matches = group_by.len() == select_columns.len()
            && group_by
                .iter()
                .zip(&select_columns)
                .all(|(g, s)| g.eq_ignore_ascii_case(s));
        if !matches {
            return Err(EngineError::semantic(
                "GROUP BY columns must match the non-aggregate SELECT columns in order.",
            ));
        }
    }

    let where_clause = match (caps.name("wcol"), caps.name("wop"), caps.name("wval")) {
        (Some(col), Some(op), Some(val)) => {
            let operator = FilterOperator::from_symbol(op.as_str()).ok_or_else(|| {
                EngineError::syntax(format!("unsupported operator '{}'", op.as_str()))
            })?;
            Some(WhereClause {
                column: col.as_str().to_string(),
                operator,
                literal: Literal::parse(val.as_str()),
            })
        }
        _ => None,
    };

    Ok(StructuredQuery {
        source,
        select_columns,
        aggregate,
        aggregate_column,
        where_clause,
        group_by,
    })
}

fn parse_aggregate(item: &str) -> EngineResult<(AggregateKind, Option<String>)> {
    let caps = AGGREGATE_RE.captures(item).ok_or_else(|| {
        EngineError::semantic("SELECT must end with an aggregate like COUNT(*), SUM(x), AVG(x)")
    })?;
    let kind = caps
        .name("func")
        .and_then(|m| AggregateKind::from_name(m.as_str()))
        .ok_or_else(|| EngineError::internal("aggregate regex matched an unknown function"))?;
    let arg = caps.name("arg").map(|m| m.as_str().trim()).unwrap_or_default();

    match (kind, arg) {
        (AggregateKind::Count, "*") => Ok((kind, None)),
        (AggregateKind::Sum | AggregateKind::Avg, "*") => Err(EngineError::semantic(format!(
            "{} requires a column argument",
            kind.name()
        ))),
        (_, col) => Ok((kind, Some(col.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_count() {
        let q = parse_query("SELECT COUNT(*) FROM data.csv").unwrap();
        assert_eq!(q.source, "data.csv");
        assert_eq!(q.aggregate, AggregateKind::Count);
        assert!(q.aggregate_column.is_none());
        assert!(q.is_scalar());
        assert_eq!(q.aggregate_label(), "COUNT(*)");
        assert!(q.required_columns().is_empty());
    }

    #[test]
    fn test_parse_grouped_sum_with_where() {
        let q = parse_query(
            "select city,   SUM(amount)\n from sales.csv where clicked >= 1 group by city;",
        )
        .unwrap();
        assert_eq!(q.select_columns, vec!["city"]);
        assert_eq!(q.group_by, vec!["city"]);
        assert_eq!(q.aggregate_label(), "SUM(amount)");
        let w = q.where_clause.as_ref().unwrap();
        assert_eq!(w.column, "clicked");
        assert_eq!(w.operator, FilterOperator::GreaterThanOrEqual);
        assert_eq!(w.literal.as_i64(), Some(1));
        assert_eq!(q.required_columns(), vec!["city", "amount", "clicked"]);
    }

    #[test]
    fn test_trailing_semicolon_not_part_of_source() {
        let q = parse_query("SELECT COUNT(*) FROM t;").unwrap();
        assert_eq!(q.source, "t");
    }

    #[test]
    fn test_quoted_literal_is_stripped() {
        let q = parse_query("SELECT COUNT(*) FROM t WHERE city = 'New York'").unwrap();
        let w = q.where_clause.unwrap();
        assert_eq!(w.literal.text(), "New York");
        assert!(w.literal.is_quoted());

        let q = parse_query("SELECT COUNT(*) FROM t WHERE city=\"Pune\"").unwrap();
        assert_eq!(q.where_clause.unwrap().literal.text(), "Pune");
    }

    #[test]
    fn test_count_column_label_keeps_column() {
        let q = parse_query("SELECT count(user_id) FROM t").unwrap();
        assert_eq!(q.aggregate_column.as_deref(), Some("user_id"));
        assert_eq!(q.aggregate_label(), "COUNT(user_id)");
    }

    #[test]
    fn test_select_without_from_is_syntax_error() {
        let err = parse_query("SELECT COUNT(*)").unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
        let err = parse_query("DELETE FROM t").unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }

    #[test]
    fn test_missing_aggregate_is_semantic_error() {
        let err = parse_query("SELECT city FROM t").unwrap_err();
        assert!(matches!(err, EngineError::Semantic { .. }));
    }

    #[test]
    fn test_group_by_mismatch_is_semantic_error() {
        let err = parse_query("SELECT region, SUM(x) FROM t GROUP BY city").unwrap_err();
        assert!(matches!(err, EngineError::Semantic { .. }));

        let err = parse_query("SELECT a, b, SUM(x) FROM t GROUP BY b, a").unwrap_err();
        assert!(matches!(err, EngineError::Semantic { .. }));
    }

    #[test]
    fn test_group_by_is_case_insensitive() {
        let q = parse_query("SELECT City, AVG(x) FROM t GROUP BY city").unwrap();
        assert_eq!(q.grouping_columns(), &["city".to_string()]);
    }

    #[test]
    fn test_sum_star_rejected() {
        let err = parse_query("SELECT SUM(*) FROM t").unwrap_err();
        assert!(matches!(err, EngineError::Semantic { .. }));
    }

    #[test]
    fn test_second_aggregate_rejected() {
        let err = parse_query("SELECT COUNT(*), COUNT(*) FROM t").unwrap_err();
        assert!(matches!(err, EngineError::Semantic { .. }));
    }

    #[test]
    fn test_duplicate_select_column_rejected() {
        let err = parse_query("SELECT city, city, COUNT(*) FROM t").unwrap_err();
        assert!(matches!(err, EngineError::Semantic { .. }));
    }

    #[test]
    fn test_operator_accepts() {
        use std::cmp::Ordering::*;
        assert!(FilterOperator::NotEquals.accepts(Less));
        assert!(!FilterOperator::NotEquals.accepts(Equal));
        assert!(FilterOperator::LessThanOrEqual.accepts(Equal));
        assert!(!FilterOperator::GreaterThan.accepts(Equal));
    }
}
