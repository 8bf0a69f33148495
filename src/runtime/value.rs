use std::fmt;

/// A runtime value of a fixture local.
///
/// Fixtures only declare integral and boolean locals. Mixed arithmetic and
/// comparisons promote `bool` to `0`/`1`, the way C++ does.
///
/// ```rust
/// use catchrun::runtime::Value;
/// assert_eq!(Value::Bool(true).as_int(), 1);
/// assert!(Value::Int(3).is_truthy());
/// assert_eq!(Value::Int(43).to_string(), "43");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl Value {
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Bool(b) => i64::from(*b),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}
