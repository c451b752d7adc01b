//! Value types shared by headers, columns and records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of a header keyword value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Real,
    Logical,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Real => write!(f, "real"),
            Self::Logical => write!(f, "logical"),
            Self::String => write!(f, "string"),
        }
    }
}

/// A typed header keyword value.
///
/// The only implicit conversion is integer to real; everything else is a
/// type mismatch for the caller to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl KeywordValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Real(_) => ValueKind::Real,
            Self::Logical(_) => ValueKind::Logical,
            Self::String(_) => ValueKind::String,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Real value, widening integers
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Self::Logical(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to `kind`, if the conversion rules allow it
    pub fn coerce(&self, kind: ValueKind) -> Option<KeywordValue> {
        match kind {
            ValueKind::Integer => self.as_integer().map(Self::Integer),
            ValueKind::Real => self.as_real().map(Self::Real),
            ValueKind::Logical => self.as_logical().map(Self::Logical),
            ValueKind::String => self.as_str().map(|s| Self::String(s.to_string())),
        }
    }
}

impl fmt::Display for KeywordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
            Self::Logical(v) => write!(f, "{}", if *v { "T" } else { "F" }),
            Self::String(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for KeywordValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for KeywordValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for KeywordValue {
    fn from(v: bool) -> Self {
        Self::Logical(v)
    }
}

impl From<&str> for KeywordValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for KeywordValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Single-precision components are widened on decode
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// Number of elements in an array of `shape`, or `None` if it overflows
/// `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

/// Homogeneous n-dimensional array.
///
/// `data` is stored first-axis-fastest, the order in which table cells are
/// laid out, so the elements of one row are contiguous and the last axis is
/// the row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> NdArray<T> {
    /// Returns `None` when `data` does not fill `shape` exactly
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Option<Self> {
        if element_count(&shape) != Some(data.len()) {
            return None;
        }
        Some(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at a multi-dimensional index
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        let mut stride = 1;
        for (&i, &n) in index.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            offset += i * stride;
            stride *= n;
        }
        self.data.get(offset)
    }

    /// The contiguous cells of one row (last-axis index)
    pub fn row(&self, row: usize) -> Option<&[T]> {
        let rows = *self.shape.last()?;
        if row >= rows {
            return None;
        }
        let per_row = self.data.len() / rows;
        Some(&self.data[row * per_row..(row + 1) * per_row])
    }
}
