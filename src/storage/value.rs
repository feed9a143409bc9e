/// Typed cell values and grouping keys
/// Rows are modelled as tagged values so grouping-key equality and literal coercion
/// are well-defined operations instead of ad hoc string/number comparisons
use serde::Serialize;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    String(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value; strings and missing values have none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::String(_) | Value::Null => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int64(_) => "integer",
            Value::Float64(_) => "float",
            Value::String(_) => "string",
            Value::Null => "null",
        }
    }

    /// Integral view of a float when it round-trips through i64 exactly
    fn integral_float(v: f64) -> Option<i64> {
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            let i = v as i64;
            if i as f64 == v {
                return Some(i);
            }
        }
        None
    }

    /// Compare this cell against a WHERE literal, coercing the literal to the cell's type.
    /// Missing values have no ordering and therefore never satisfy a predicate.
    pub fn compare_literal(&self, literal: &crate::query::Literal) -> Option<Ordering> {
        match self {
            Value::Null => None,
            Value::Int64(v) => {
                if let Some(i) = literal.as_i64() {
                    Some(v.cmp(&i))
                } else if let Some(f) = literal.as_f64() {
                    (*v as f64).partial_cmp(&f)
                } else {
                    Some(v.to_string().as_str().cmp(literal.text()))
                }
            }
            Value::Float64(v) => match literal.as_f64() {
                Some(f) => v.partial_cmp(&f),
                None => Some(v.to_string().as_str().cmp(literal.text())),
            },
            Value::String(s) => Some(s.as_str().cmp(literal.text())),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Null => write!(f, "NULL"),
        }
    }
}

// Integral floats hash and compare like the equivalent integer so that a key parsed
// as 5 and a key parsed as 5.0 land in the same group.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int64(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Value::Float64(v) => match Value::integral_float(*v) {
                Some(i) => {
                    0u8.hash(state);
                    i.hash(state);
                }
                None => {
                    1u8.hash(state);
                    let bits = if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() };
                    bits.hash(state);
                }
            },
            Value::String(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Value::Null => {
                3u8.hash(state);
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => {
                (a.is_nan() && b.is_nan()) || a == b
            }
            (Value::Int64(a), Value::Float64(b)) | (Value::Float64(b), Value::Int64(a)) => {
                Value::integral_float(*b) == Some(*a)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Ordered tuple of grouping-column values; the empty key is the implicit scalar group
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct GroupKey(pub Vec<Value>);

impl GroupKey {
    pub fn scalar() -> Self {
        GroupKey(Vec::new())
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}
