//! Container interface
//!
//! The loader never parses the binary container format itself. It talks to
//! an engine through [`Container`]: a cursor over the extensions of one file
//! that hands out headers and raw column buffers.
//!
//! [`MemoryContainer`] is an in-memory engine. It can be deserialized from a
//! JSON dump of a container and backs both the test suite and the CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ContainerError, Result};
use crate::header::{Card, Header};
use crate::value::KeywordValue;

/// Raw column buffer as returned by the container engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RawColumn {
    Logical(Vec<bool>),
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    ComplexFloat(Vec<[f32; 2]>),
    ComplexDouble(Vec<[f64; 2]>),
    /// One fixed-width cell per row
    Text(Vec<String>),
}

impl RawColumn {
    /// Number of elements (cells for text)
    pub fn len(&self) -> usize {
        match self {
            Self::Logical(v) => v.len(),
            Self::Byte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::ComplexFloat(v) => v.len(),
            Self::ComplexDouble(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Logical(_) => "logical",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::ComplexFloat(_) => "complex_float",
            Self::ComplexDouble(_) => "complex_double",
            Self::Text(_) => "text",
        }
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        match self {
            Self::Logical(v) => Self::Logical(v[start..end].to_vec()),
            Self::Byte(v) => Self::Byte(v[start..end].to_vec()),
            Self::Short(v) => Self::Short(v[start..end].to_vec()),
            Self::Int(v) => Self::Int(v[start..end].to_vec()),
            Self::Long(v) => Self::Long(v[start..end].to_vec()),
            Self::Float(v) => Self::Float(v[start..end].to_vec()),
            Self::Double(v) => Self::Double(v[start..end].to_vec()),
            Self::ComplexFloat(v) => Self::ComplexFloat(v[start..end].to_vec()),
            Self::ComplexDouble(v) => Self::ComplexDouble(v[start..end].to_vec()),
            Self::Text(v) => Self::Text(v[start..end].to_vec()),
        }
    }
}

/// A binary table container engine.
///
/// Positions are 1-based; position 1 is the container-level metadata
/// extension. All reads apply to the extension selected by the last
/// `move_to`.
pub trait Container {
    /// Number of extensions, including the first
    fn extension_count(&self) -> usize;

    /// Select the extension at `position`
    fn move_to(&mut self, position: usize) -> std::result::Result<(), ContainerError>;

    /// Header of the selected extension
    fn header(&self) -> std::result::Result<Header, ContainerError>;

    /// Read `nrows` rows of 0-based `column` starting at 1-based `first_row`
    fn read_column(
        &mut self,
        column: usize,
        first_row: usize,
        nrows: usize,
    ) -> std::result::Result<RawColumn, ContainerError>;
}

/// One extension of a [`MemoryContainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryExtension {
    pub header: Header,
    #[serde(default)]
    pub columns: Vec<RawColumn>,
}

impl MemoryExtension {
    /// A container-level metadata extension with no data
    pub fn primary() -> Self {
        Self {
            header: vec![
                Card::new("SIMPLE", true),
                Card::new("BITPIX", 8i64),
                Card::new("NAXIS", 0i64),
            ]
            .into(),
            columns: Vec::new(),
        }
    }
}

/// In-memory container engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryContainer {
    extensions: Vec<MemoryExtension>,
    #[serde(skip)]
    current: Option<usize>,
}

impl MemoryContainer {
    pub fn new(extensions: Vec<MemoryExtension>) -> Self {
        Self {
            extensions,
            current: None,
        }
    }

    pub fn push(&mut self, extension: MemoryExtension) {
        self.extensions.push(extension);
    }

    pub fn extensions(&self) -> &[MemoryExtension] {
        &self.extensions
    }

    /// Parse a JSON container dump
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON container dump from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn selected(&self) -> std::result::Result<&MemoryExtension, ContainerError> {
        let index = self
            .current
            .ok_or_else(|| ContainerError::Malformed("no extension selected".to_string()))?;
        Ok(&self.extensions[index])
    }
}

impl Container for MemoryContainer {
    fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    fn move_to(&mut self, position: usize) -> std::result::Result<(), ContainerError> {
        if position == 0 || position > self.extensions.len() {
            return Err(ContainerError::NoSuchExtension(position));
        }
        self.current = Some(position - 1);
        Ok(())
    }

    fn header(&self) -> std::result::Result<Header, ContainerError> {
        Ok(self.selected()?.header.clone())
    }

    fn read_column(
        &mut self,
        column: usize,
        first_row: usize,
        nrows: usize,
    ) -> std::result::Result<RawColumn, ContainerError> {
        let ext = self.selected()?;
        let raw = ext
            .columns
            .get(column)
            .ok_or(ContainerError::NoSuchColumn(column))?;
        let rows = ext
            .header
            .integer("NAXIS2")
            .map_err(|e| ContainerError::Malformed(e.to_string()))?
            .max(0) as usize;

        let end = first_row.saturating_sub(1).saturating_add(nrows);
        if first_row == 0 || end > rows {
            return Err(ContainerError::RowsOutOfRange {
                first: first_row,
                end,
                rows,
            });
        }
        if first_row == 1 && nrows == rows {
            return Ok(raw.clone());
        }
        let per_row = if matches!(raw, RawColumn::Text(_)) {
            1
        } else {
            raw.len() / rows
        };
        match end.checked_mul(per_row) {
            Some(stop) if stop <= raw.len() => Ok(raw.slice((first_row - 1) * per_row, stop)),
            _ => Err(ContainerError::Malformed(format!(
                "column {} holds {} element(s), fewer than NAXIS2 = {} rows need",
                column,
                raw.len(),
                rows
            ))),
        }
    }
}

/// Builds a binary table extension from named columns
#[derive(Debug, Clone)]
pub struct TableBuilder {
    rows: usize,
    keywords: Vec<Card>,
    columns: Vec<(Vec<Card>, RawColumn)>,
}

impl TableBuilder {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            keywords: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Add an OIFITS data-block identity and revision
    pub fn oi(self, extname: &str, revision: i64) -> Self {
        self.keyword("EXTNAME", extname).keyword("OI_REVN", revision)
    }

    pub fn keyword(mut self, keyword: &str, value: impl Into<KeywordValue>) -> Self {
        self.keywords.push(Card::new(keyword, value));
        self
    }

    pub fn column(self, name: &str, tform: &str, data: RawColumn) -> Self {
        self.column_with_dims(name, tform, None, data)
    }

    pub fn column_with_dims(
        mut self,
        name: &str,
        tform: &str,
        tdim: Option<&str>,
        data: RawColumn,
    ) -> Self {
        let n = self.columns.len() + 1;
        let mut cards = vec![
            Card::new(&format!("TTYPE{}", n), name),
            Card::new(&format!("TFORM{}", n), tform),
        ];
        if let Some(tdim) = tdim {
            cards.push(Card::new(&format!("TDIM{}", n), tdim));
        }
        self.columns.push((cards, data));
        self
    }

    pub fn build(self) -> MemoryExtension {
        let mut cards = vec![
            Card::new("XTENSION", "BINTABLE"),
            Card::new("BITPIX", 8i64),
            Card::new("NAXIS", 2i64),
            Card::new("NAXIS2", self.rows as i64),
            Card::new("TFIELDS", self.columns.len() as i64),
        ];
        cards.extend(self.keywords);
        let mut data = Vec::with_capacity(self.columns.len());
        for (column_cards, raw) in self.columns {
            cards.extend(column_cards);
            data.push(raw);
        }
        MemoryExtension {
            header: cards.into(),
            columns: data,
        }
    }
}
