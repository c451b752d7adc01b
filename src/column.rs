//! Column Decoder
//!
//! Turns one raw column buffer into a typed, correctly shaped value.
//!
//! Numeric columns that hold one element per row decode to a flat sequence
//! of `rows` elements; everything else decodes to an array of shape
//! `per_row_shape ++ [rows]`. For text columns the string length is
//! encoding metadata and is removed from the shape.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

use crate::container::{Container, RawColumn};
use crate::error::{OifitsError, Result};
use crate::header::{normalize_name, Header};
use crate::value::{element_count, Complex64, NdArray};

/// Element type of a binary table column (the `TFORM` type code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ElementType {
    Logical,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ComplexFloat,
    ComplexDouble,
    Text,
}

impl ElementType {
    /// Map a `TFORM` type code, `None` for codes this decoder does not read
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'L' => Some(Self::Logical),
            'B' => Some(Self::Byte),
            'I' => Some(Self::Short),
            'J' => Some(Self::Int),
            'K' => Some(Self::Long),
            'E' => Some(Self::Float),
            'D' => Some(Self::Double),
            'C' => Some(Self::ComplexFloat),
            'M' => Some(Self::ComplexDouble),
            'A' => Some(Self::Text),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Logical => 'L',
            Self::Byte => 'B',
            Self::Short => 'I',
            Self::Int => 'J',
            Self::Long => 'K',
            Self::Float => 'E',
            Self::Double => 'D',
            Self::ComplexFloat => 'C',
            Self::ComplexDouble => 'M',
            Self::Text => 'A',
        }
    }

    /// Bytes per element
    pub fn width(&self) -> usize {
        match self {
            Self::Logical | Self::Byte | Self::Text => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double | Self::ComplexFloat => 8,
            Self::ComplexDouble => 16,
        }
    }
}

/// Declared layout of one column, read from the `TTYPEn`/`TFORMn`/`TDIMn`
/// cards of its extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub form: String,
    pub element: ElementType,
    pub repeat: usize,
    pub width: usize,
    pub dims: Option<Vec<usize>>,
    pub unit: Option<String>,
    /// Characters per string for text columns (`rAw` or first `TDIM` axis)
    pub string_len: Option<usize>,
}

fn tform_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d*)\s*([A-Za-z])\s*(\d*)").expect("valid TFORM pattern"))
}

fn tdim_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\(\s*(\d+(?:\s*,\s*\d+)*)\s*\)\s*$").expect("valid TDIM pattern")
    })
}

/// Parse a `TDIM` value such as `(2,3)`
pub fn parse_tdim(tdim: &str) -> Option<Vec<usize>> {
    let caps = tdim_regex().captures(tdim)?;
    caps[1]
        .split(',')
        .map(|d| d.trim().parse().ok())
        .collect()
}

impl ColumnDescriptor {
    /// Describe the column at 0-based `index`
    pub fn from_header(header: &Header, index: usize) -> Result<Self> {
        let n = index + 1;
        let name = normalize_name(header.string(&format!("TTYPE{}", n))?);
        let form = header.string(&format!("TFORM{}", n))?.trim().to_string();
        let unsupported = || OifitsError::UnsupportedColumnType {
            column: name.clone(),
            form: form.clone(),
        };

        let caps = tform_regex().captures(&form).ok_or_else(unsupported)?;
        let code = caps[2].chars().next().map(|c| c.to_ascii_uppercase()).unwrap_or(' ');
        let element = ElementType::from_code(code).ok_or_else(unsupported)?;
        let repeat = if caps[1].is_empty() {
            1
        } else {
            caps[1].parse().map_err(|_| unsupported())?
        };

        let dims = match header.string_or(&format!("TDIM{}", n), "")? {
            "" => None,
            raw => Some(parse_tdim(raw).ok_or_else(|| OifitsError::InvalidDimensions {
                column: name.clone(),
                message: format!("cannot parse TDIM '{}'", raw),
            })?),
        };
        if let Some(dims) = &dims {
            let message = match element_count(dims) {
                Some(product) if product == repeat => None,
                Some(product) => Some(format!(
                    "TDIM {:?} holds {} elements, repeat is {}",
                    dims, product, repeat
                )),
                None => Some(format!("TDIM {:?} overflows the element count", dims)),
            };
            if let Some(message) = message {
                return Err(OifitsError::InvalidDimensions { column: name, message });
            }
        }

        let string_len = if element == ElementType::Text {
            let len = match (&dims, caps[3].parse::<usize>()) {
                (Some(dims), _) => dims[0],
                (None, Ok(w)) if w > 0 => w,
                _ => repeat,
            };
            if len > 0 && repeat % len != 0 {
                return Err(OifitsError::InvalidDimensions {
                    column: name,
                    message: format!("string length {} does not divide repeat {}", len, repeat),
                });
            }
            Some(len)
        } else {
            None
        };

        let unit = header
            .string_or(&format!("TUNIT{}", n), "")?
            .trim()
            .to_string();

        Ok(Self {
            name,
            width: element.width(),
            form,
            element,
            repeat,
            dims,
            unit: if unit.is_empty() { None } else { Some(unit) },
            string_len,
        })
    }

    /// Number of raw buffer elements in one row
    pub fn elements_per_row(&self) -> usize {
        self.repeat
    }

    /// Shape of the decoded value for `rows` rows
    pub fn shape(&self, rows: usize) -> Vec<usize> {
        let mut shape = match (self.element, &self.dims) {
            (ElementType::Text, Some(dims)) => dims[1..].to_vec(),
            (ElementType::Text, None) => {
                let per_row = self.strings_per_row();
                if per_row == 1 {
                    Vec::new()
                } else {
                    vec![per_row]
                }
            }
            (_, Some(dims)) => dims.clone(),
            (_, None) if self.repeat == 1 => Vec::new(),
            (_, None) => vec![self.repeat],
        };
        shape.push(rows);
        shape
    }

    fn strings_per_row(&self) -> usize {
        match (self.string_len, &self.dims) {
            (_, Some(dims)) => dims[1..].iter().product(),
            (Some(0), None) => 1,
            (Some(len), None) => self.repeat / len,
            (None, None) => 1,
        }
    }
}

/// A fully decoded column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "array", rename_all = "lowercase")]
pub enum ColumnData {
    Logical(NdArray<bool>),
    Integer(NdArray<i64>),
    Real(NdArray<f64>),
    Complex(NdArray<Complex64>),
    Text(NdArray<String>),
}

impl ColumnData {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Logical(a) => a.shape(),
            Self::Integer(a) => a.shape(),
            Self::Real(a) => a.shape(),
            Self::Complex(a) => a.shape(),
            Self::Text(a) => a.shape(),
        }
    }

    /// Number of rows (the last axis)
    pub fn rows(&self) -> usize {
        self.shape().last().copied().unwrap_or(0)
    }

    pub fn as_text(&self) -> Option<&NdArray<String>> {
        match self {
            Self::Text(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&NdArray<i64>> {
        match self {
            Self::Integer(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<&NdArray<f64>> {
        match self {
            Self::Real(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<&NdArray<bool>> {
        match self {
            Self::Logical(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<&NdArray<Complex64>> {
        match self {
            Self::Complex(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Logical(_) => "logical",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Complex(_) => "complex",
            Self::Text(_) => "text",
        };
        write!(f, "{}{:?}", kind, self.shape())
    }
}

/// Strip trailing padding from a text cell.
///
/// Trailing ASCII whitespace is removed, and so are trailing NUL bytes:
/// fixed-width FITS character fields may be filled with NUL after the last
/// character, so NUL fill is treated as padding too. Interior NUL and
/// whitespace are kept.
pub fn strip_padding(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == '\0' || c.is_ascii_whitespace())
}

/// Decode a raw buffer holding `rows` rows of the described column
pub fn decode(desc: &ColumnDescriptor, raw: RawColumn, rows: usize) -> Result<ColumnData> {
    let shape = desc.shape(rows);

    if let RawColumn::Text(cells) = raw {
        if desc.element != ElementType::Text {
            return Err(buffer_mismatch(desc, "text"));
        }
        return decode_text(desc, cells, rows, shape);
    }

    let expected = desc
        .elements_per_row()
        .checked_mul(rows)
        .ok_or_else(|| too_large(desc, rows))?;
    if raw.len() != expected {
        return Err(OifitsError::ColumnLength {
            column: desc.name.clone(),
            expected,
            found: raw.len(),
        });
    }

    let shaped = |len: usize| OifitsError::ColumnLength {
        column: desc.name.clone(),
        expected,
        found: len,
    };

    use ElementType as E;
    let data = match (desc.element, raw) {
        (E::Logical, RawColumn::Logical(v)) => {
            let len = v.len();
            ColumnData::Logical(NdArray::new(shape.clone(), v).ok_or_else(|| shaped(len))?)
        }
        (E::Byte, RawColumn::Byte(v)) => integers(v, &shape).ok_or_else(|| shaped(expected))?,
        (E::Short, RawColumn::Short(v)) => integers(v, &shape).ok_or_else(|| shaped(expected))?,
        (E::Int, RawColumn::Int(v)) => integers(v, &shape).ok_or_else(|| shaped(expected))?,
        (E::Long, RawColumn::Long(v)) => integers(v, &shape).ok_or_else(|| shaped(expected))?,
        (E::Float, RawColumn::Float(v)) => {
            let v = v.into_iter().map(f64::from).collect();
            ColumnData::Real(NdArray::new(shape.clone(), v).ok_or_else(|| shaped(expected))?)
        }
        (E::Double, RawColumn::Double(v)) => {
            ColumnData::Real(NdArray::new(shape.clone(), v).ok_or_else(|| shaped(expected))?)
        }
        (E::ComplexFloat, RawColumn::ComplexFloat(v)) => {
            let v = v
                .into_iter()
                .map(|[re, im]| Complex64::new(re.into(), im.into()))
                .collect();
            ColumnData::Complex(NdArray::new(shape.clone(), v).ok_or_else(|| shaped(expected))?)
        }
        (E::ComplexDouble, RawColumn::ComplexDouble(v)) => {
            let v = v.into_iter().map(|[re, im]| Complex64::new(re, im)).collect();
            ColumnData::Complex(NdArray::new(shape.clone(), v).ok_or_else(|| shaped(expected))?)
        }
        (_, other) => return Err(buffer_mismatch(desc, other.type_name())),
    };
    Ok(data)
}

fn integers<T: Into<i64>>(values: Vec<T>, shape: &[usize]) -> Option<ColumnData> {
    let values = values.into_iter().map(Into::into).collect();
    NdArray::new(shape.to_vec(), values).map(ColumnData::Integer)
}

fn too_large(desc: &ColumnDescriptor, rows: usize) -> OifitsError {
    OifitsError::InvalidDimensions {
        column: desc.name.clone(),
        message: format!(
            "{} row(s) of {} element(s) overflow the element count",
            rows, desc.repeat
        ),
    }
}

fn buffer_mismatch(desc: &ColumnDescriptor, buffer: &str) -> OifitsError {
    OifitsError::UnsupportedColumnType {
        column: desc.name.clone(),
        form: format!("{} (engine returned a {} buffer)", desc.form, buffer),
    }
}

fn decode_text(
    desc: &ColumnDescriptor,
    cells: Vec<String>,
    rows: usize,
    shape: Vec<usize>,
) -> Result<ColumnData> {
    if cells.len() != rows {
        return Err(OifitsError::ColumnLength {
            column: desc.name.clone(),
            expected: rows,
            found: cells.len(),
        });
    }
    let len = desc.string_len.unwrap_or(desc.repeat);
    let per_row = desc.strings_per_row();
    let total = rows.checked_mul(per_row).ok_or_else(|| too_large(desc, rows))?;

    let mut strings = Vec::new();
    for cell in &cells {
        let bytes = cell.as_bytes();
        if bytes.len() > desc.repeat {
            return Err(OifitsError::ColumnLength {
                column: desc.name.clone(),
                expected: desc.repeat,
                found: bytes.len(),
            });
        }
        for i in 0..per_row {
            let start = (i * len).min(bytes.len());
            let end = ((i + 1) * len).min(bytes.len());
            let value = String::from_utf8_lossy(&bytes[start..end]);
            strings.push(strip_padding(&value).to_string());
        }
    }

    let strings_len = strings.len();
    NdArray::new(shape, strings)
        .map(ColumnData::Text)
        .ok_or_else(|| OifitsError::ColumnLength {
            column: desc.name.clone(),
            expected: total,
            found: strings_len,
        })
}

/// Describe, read and decode column `index` (0-based) of the current
/// extension of `container`.
///
/// Errors from the container itself come back as `OifitsError::Container`.
pub fn read_column<C: Container + ?Sized>(
    container: &mut C,
    header: &Header,
    index: usize,
) -> Result<ColumnData> {
    let desc = ColumnDescriptor::from_header(header, index)?;
    let rows = header.row_count()?;
    let raw = container.read_column(index, 1, rows)?;
    decode(&desc, raw, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Card;

    fn header_for(form: &str, tdim: Option<&str>, rows: i64) -> Header {
        let mut cards = vec![
            Card::new("XTENSION", "BINTABLE"),
            Card::new("NAXIS2", rows),
            Card::new("TFIELDS", 1i64),
            Card::new("TTYPE1", "DATA"),
            Card::new("TFORM1", form),
        ];
        if let Some(tdim) = tdim {
            cards.push(Card::new("TDIM1", tdim));
        }
        cards.into()
    }

    fn describe(form: &str, tdim: Option<&str>) -> Result<ColumnDescriptor> {
        ColumnDescriptor::from_header(&header_for(form, tdim, 1), 0)
    }

    #[test]
    fn test_parse_tform() {
        let d = describe("3D", None).unwrap();
        assert_eq!(d.element, ElementType::Double);
        assert_eq!(d.repeat, 3);
        assert_eq!(d.width, 8);

        let d = describe("J", None).unwrap();
        assert_eq!(d.element, ElementType::Int);
        assert_eq!(d.repeat, 1);
    }

    #[test]
    fn test_unsupported_tform() {
        for form in ["1PE(10)", "8X", "", "?"] {
            assert!(
                matches!(describe(form, None), Err(OifitsError::UnsupportedColumnType { .. })),
                "form {:?} should be unsupported",
                form
            );
        }
    }

    #[test]
    fn test_parse_tdim() {
        assert_eq!(parse_tdim("(2,3)"), Some(vec![2, 3]));
        assert_eq!(parse_tdim(" ( 4 ) "), Some(vec![4]));
        assert_eq!(parse_tdim("2,3"), None);
    }

    #[test]
    fn test_tdim_must_match_repeat() {
        assert!(matches!(
            describe("5D", Some("(2,3)")),
            Err(OifitsError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let err = describe("4D", Some("(4294967296,4294967296,4)")).unwrap_err();
        assert!(matches!(err, OifitsError::InvalidDimensions { .. }));

        let d = describe("18446744073709551615D", None).unwrap();
        assert_eq!(d.repeat, usize::MAX);
        let err = decode(&d, RawColumn::Double(vec![1.0, 2.0]), 2).unwrap_err();
        assert!(matches!(err, OifitsError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_scalar_column_is_flat() {
        let d = describe("1D", None).unwrap();
        let data = decode(&d, RawColumn::Double(vec![1.0, 2.0, 3.0, 4.0]), 4).unwrap();
        assert_eq!(data.shape(), &[4]);
        assert_eq!(data.as_real().unwrap().as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_multidimensional_column() {
        let d = describe("6E", Some("(2,3)")).unwrap();
        let raw: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let data = decode(&d, RawColumn::Float(raw), 4).unwrap();
        assert_eq!(data.shape(), &[2, 3, 4]);
        let arr = data.as_real().unwrap();
        assert_eq!(arr.get(&[1, 2, 3]), Some(&23.0));
        assert_eq!(arr.row(2).unwrap()[0], 12.0);
    }

    #[test]
    fn test_vector_column_without_tdim() {
        let d = describe("2I", None).unwrap();
        let data = decode(&d, RawColumn::Short(vec![1, 2, 3, 4, 5, 6]), 3).unwrap();
        assert_eq!(data.shape(), &[2, 3]);
        assert_eq!(data.as_integer().unwrap().row(1), Some(&[3i64, 4][..]));
    }

    #[test]
    fn test_short_buffer_is_not_truncated() {
        let d = describe("2D", None).unwrap();
        let err = decode(&d, RawColumn::Double(vec![1.0, 2.0, 3.0]), 2).unwrap_err();
        assert!(matches!(err, OifitsError::ColumnLength { expected: 4, found: 3, .. }));
    }

    #[test]
    fn test_text_strips_trailing_whitespace_only() {
        let d = describe("6A", None).unwrap();
        let cells = vec!["ABC   ".to_string(), "A B".to_string(), "  X\0\0\0".to_string()];
        let data = decode(&d, RawColumn::Text(cells), 3).unwrap();
        assert_eq!(data.shape(), &[3]);
        assert_eq!(data.as_text().unwrap().as_slice(), &["ABC", "A B", "  X"]);
    }

    #[test]
    fn test_nul_fill_is_padding() {
        assert_eq!(strip_padding("GRAV\0\0 \0"), "GRAV");
        assert_eq!(strip_padding("A\0B\0"), "A\0B");
        assert_eq!(strip_padding("\0 X"), "\0 X");
        assert_eq!(strip_padding("\0\0"), "");
    }

    #[test]
    fn test_multivalued_text() {
        let d = describe("12A", Some("(4,3)")).unwrap();
        assert_eq!(d.string_len, Some(4));
        let cells = vec!["S1  S2  S3  ".to_string(), "AB  CD  ".to_string()];
        let data = decode(&d, RawColumn::Text(cells), 2).unwrap();
        assert_eq!(data.shape(), &[3, 2]);
        assert_eq!(
            data.as_text().unwrap().as_slice(),
            &["S1", "S2", "S3", "AB", "CD", ""]
        );
    }

    #[test]
    fn test_raw_aw_form() {
        let d = describe("8A4", None).unwrap();
        let data = decode(&d, RawColumn::Text(vec!["ab  cd  ".into()]), 1).unwrap();
        assert_eq!(data.shape(), &[2, 1]);
    }

    #[test]
    fn test_buffer_type_must_match_form() {
        let d = describe("1D", None).unwrap();
        let err = decode(&d, RawColumn::Int(vec![1]), 1).unwrap_err();
        assert!(matches!(err, OifitsError::UnsupportedColumnType { .. }));
    }

    #[test]
    fn test_complex_column() {
        let d = describe("1C", None).unwrap();
        let data = decode(&d, RawColumn::ComplexFloat(vec![[1.0, -1.0], [0.5, 2.0]]), 2).unwrap();
        assert_eq!(data.shape(), &[2]);
        assert_eq!(data.as_complex().unwrap().as_slice()[1], Complex64::new(0.5, 2.0));
    }
}
