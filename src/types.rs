use crate::errors::DbError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    INT,
    TEXT,
    VARCHAR,
    REAL,
    BOOLEAN,
}

impl DataType {
    /// Maps a declared SQL type name (case-insensitive, aliases included) onto
    /// one of the supported types. A length suffix such as `VARCHAR(50)` is
    /// accepted and ignored.
    pub fn from_string(s: &str) -> Result<Self, DbError> {
        let base = s.split('(').next().unwrap_or(s).trim();
        match base.to_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(DataType::INT),
            "TEXT" | "STRING" => Ok(DataType::TEXT),
            "VARCHAR" => Ok(DataType::VARCHAR),
            "REAL" | "FLOAT" | "DOUBLE" => Ok(DataType::REAL),
            "BOOLEAN" | "BOOL" => Ok(DataType::BOOLEAN),
            _ => Err(DbError::UnsupportedType(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::INT => "INT",
            DataType::TEXT => "TEXT",
            DataType::VARCHAR => "VARCHAR",
            DataType::REAL => "REAL",
            DataType::BOOLEAN => "BOOLEAN",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
}

impl Column {
    /// A nullable column without key constraints.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self::with_constraints(name, data_type, false, false, true)
    }

    /// A primary key column is never nullable, whatever `nullable` says.
    pub fn with_constraints(
        name: impl Into<String>,
        data_type: DataType,
        primary_key: bool,
        unique: bool,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key,
            unique,
            nullable: nullable && !primary_key,
        }
    }

    pub fn primary_key(self) -> Self {
        Self::with_constraints(self.name, self.data_type, true, self.unique, false)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Primary key or explicitly unique.
    pub fn requires_uniqueness(&self) -> bool {
        self.primary_key || self.unique
    }

    /// Checks the null constraint and coerces `value` to this column's type.
    pub fn validate_value(&self, value: TypedValue) -> Result<TypedValue, DbError> {
        if value.is_null() {
            if self.nullable {
                return Ok(TypedValue::Null);
            }
            return Err(DbError::NullConstraintViolation(self.name.clone()));
        }

        value
            .coerce(self.data_type)
            .ok_or_else(|| DbError::TypeMismatch {
                column: self.name.clone(),
                expected: self.data_type.to_string(),
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypedValue {
    Integer(i64),
    Real(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
    Null,
}

impl TypedValue {
    pub fn real(value: f64) -> Self {
        TypedValue::Real(OrderedFloat(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        TypedValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn get_type(&self) -> Option<DataType> {
        match self {
            TypedValue::Integer(_) => Some(DataType::INT),
            TypedValue::Real(_) => Some(DataType::REAL),
            TypedValue::Text(_) => Some(DataType::TEXT),
            TypedValue::Boolean(_) => Some(DataType::BOOLEAN),
            TypedValue::Null => None,
        }
    }

    /// Converts a non-null value to `data_type`, or `None` when the value has
    /// no sensible representation there.
    pub fn coerce(&self, data_type: DataType) -> Option<TypedValue> {
        match data_type {
            DataType::INT => match self {
                TypedValue::Integer(i) => Some(TypedValue::Integer(*i)),
                TypedValue::Real(f) => {
                    let truncated = f.trunc();
                    if truncated.is_finite()
                        && truncated >= i64::MIN as f64
                        && truncated <= i64::MAX as f64
                    {
                        Some(TypedValue::Integer(truncated as i64))
                    } else {
                        None
                    }
                }
                TypedValue::Text(s) => s.trim().parse::<i64>().ok().map(TypedValue::Integer),
                TypedValue::Boolean(b) => Some(TypedValue::Integer(i64::from(*b))),
                TypedValue::Null => None,
            },
            DataType::TEXT | DataType::VARCHAR => match self {
                TypedValue::Null => None,
                other => Some(TypedValue::Text(other.to_string())),
            },
            DataType::REAL => match self {
                TypedValue::Integer(i) => Some(TypedValue::real(*i as f64)),
                // NaN and infinities have no JSON representation
                TypedValue::Real(f) if f.is_finite() => Some(TypedValue::Real(*f)),
                TypedValue::Real(_) => None,
                TypedValue::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(TypedValue::real),
                TypedValue::Boolean(b) => Some(TypedValue::real(if *b { 1.0 } else { 0.0 })),
                TypedValue::Null => None,
            },
            DataType::BOOLEAN => match self {
                TypedValue::Boolean(b) => Some(TypedValue::Boolean(*b)),
                TypedValue::Integer(1) => Some(TypedValue::Boolean(true)),
                TypedValue::Integer(0) => Some(TypedValue::Boolean(false)),
                TypedValue::Real(f) if f.0 == 1.0 => Some(TypedValue::Boolean(true)),
                TypedValue::Real(f) if f.0 == 0.0 => Some(TypedValue::Boolean(false)),
                TypedValue::Text(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => Some(TypedValue::Boolean(true)),
                    "false" | "0" | "no" => Some(TypedValue::Boolean(false)),
                    _ => None,
                },
                _ => None,
            },
        }
    }

    /// Equality as used by WHERE filters and join conditions: NULL matches
    /// NULL, integers and reals compare numerically, other types must agree.
    pub fn matches(&self, other: &TypedValue) -> bool {
        match (self, other) {
            (TypedValue::Integer(a), TypedValue::Real(b))
            | (TypedValue::Real(b), TypedValue::Integer(a)) => (*a as f64) == b.0,
            (a, b) => a == b,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            TypedValue::Null => 0,
            TypedValue::Boolean(_) => 1,
            TypedValue::Integer(_) | TypedValue::Real(_) => 2,
            TypedValue::Text(_) => 3,
        }
    }
}

impl PartialOrd for TypedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TypedValue::Null, TypedValue::Null) => Ordering::Equal,
            (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a.cmp(b),
            (TypedValue::Integer(a), TypedValue::Integer(b)) => a.cmp(b),
            (TypedValue::Real(a), TypedValue::Real(b)) => a.cmp(b),
            (TypedValue::Text(a), TypedValue::Text(b)) => a.cmp(b),
            // Numeric cross-type: by value, integers first on ties
            (TypedValue::Integer(a), TypedValue::Real(b)) => OrderedFloat(*a as f64)
                .cmp(b)
                .then(Ordering::Less),
            (TypedValue::Real(a), TypedValue::Integer(b)) => a
                .cmp(&OrderedFloat(*b as f64))
                .then(Ordering::Greater),
            // Null < Boolean < numbers < Text
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Real(r) => write!(f, "{:?}", r.0),
            TypedValue::Text(s) => write!(f, "{}", s),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Integer(i64::from(value))
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::real(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::Text(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::Text(value)
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(TypedValue::Null, Into::into)
    }
}
