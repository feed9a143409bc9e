/// Unified error type for the approximate query engine
/// Every failure is terminal for the current query run; nothing is retried internally
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Syntax errors: query text does not match the supported grammar
    #[error("Syntax error: {message}")]
    Syntax {
        message: String,
        query: Option<String>,
    },

    /// Semantic errors: well-formed query that cannot be executed as written
    #[error("Semantic error: {message}")]
    Semantic {
        message: String,
        query: Option<String>,
        context: Option<String>,
    },

    /// Configuration errors: unknown mode, out-of-range sampling rate, bad sketch shape
    #[error("Config error: {message}")]
    Config {
        message: String,
        setting: Option<String>,
    },

    /// Schema errors: referenced column absent or unusable at read time
    #[error("Schema error: {message}")]
    Schema {
        message: String,
        column: Option<String>,
        source_name: Option<String>,
    },

    /// IO errors: unreadable files, decode failures in the row source
    #[error("IO error: {message}")]
    IO {
        message: String,
        path: Option<String>,
        source_message: Option<String>,
    },

    /// Cancellation errors: caller raised the cooperative cancel flag
    #[error("Cancellation: {message}")]
    Cancellation {
        message: String,
        reason: Option<String>,
    },

    /// Internal errors: should never happen, indicates bug
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

impl EngineError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            query: None,
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic {
            message: message.into(),
            query: None,
            context: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            setting: None,
        }
    }

    pub fn config_for(message: impl Into<String>, setting: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            setting: Some(setting.into()),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            column: None,
            source_name: None,
        }
    }

    /// Column missing from (or unusable in) a named source
    pub fn missing_column(column: impl Into<String>, source_name: impl Into<String>) -> Self {
        let column = column.into();
        let source_name = source_name.into();
        Self::Schema {
            message: format!("column '{}' not found in '{}'", column, source_name),
            column: Some(column),
            source_name: Some(source_name),
        }
    }

    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::IO {
            message: message.into(),
            path: Some(path.into()),
            source_message: None,
        }
    }

    pub fn cancellation(message: impl Into<String>) -> Self {
        Self::Cancellation {
            message: message.into(),
            reason: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Attach the offending query text to syntax and semantic errors
    pub fn with_query(mut self, sql: impl Into<String>) -> Self {
        match &mut self {
            Self::Syntax { query, .. } | Self::Semantic { query, .. } => *query = Some(sql.into()),
            _ => {}
        }
        self
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            context: None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::IO {
            message: err.to_string(),
            path: None,
            source_message: None,
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        Self::IO {
            message: format!("CSV decode failed: {}", err),
            path: None,
            source_message: None,
        }
    }
}

impl From<arrow::error::ArrowError> for EngineError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::IO {
            message: format!("Arrow error: {}", err),
            path: None,
            source_message: None,
        }
    }
}

impl From<parquet::errors::ParquetError> for EngineError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::IO {
            message: format!("Parquet error: {}", err),
            path: None,
            source_message: None,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            message: format!("invalid JSON: {}", err),
            setting: None,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_carries_names() {
        let err = EngineError::missing_column("amount", "sales.csv");
        match err {
            EngineError::Schema { column, source_name, message } => {
                assert_eq!(column.as_deref(), Some("amount"));
                assert_eq!(source_name.as_deref(), Some("sales.csv"));
                assert!(message.contains("amount"));
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_with_query_only_touches_query_errors() {
        let err = EngineError::semantic("bad group by").with_query("SELECT x FROM t");
        assert!(matches!(err, EngineError::Semantic { query: Some(_), .. }));

        let err = EngineError::config("bad rate").with_query("SELECT x FROM t");
        assert!(matches!(err, EngineError::Config { .. }));
    }
}
