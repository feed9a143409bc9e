/// Restricted-SQL front end
pub mod parser;

pub use parser::{
    parse_query, AggregateKind, FilterOperator, Literal, StructuredQuery, WhereClause,
};
