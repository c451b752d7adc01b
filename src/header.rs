//! Header Accessor
//!
//! Typed, defaulted access to the keyword/value/comment cards of one
//! extension header. Lookups that take no default fail with
//! `MissingKeyword`; typed lookups fail with `TypeMismatch` unless the stored
//! value converts under [`KeywordValue::coerce`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::column::ColumnDescriptor;
use crate::error::{ContainerError, OifitsError, Result};
use crate::value::{KeywordValue, ValueKind};

/// One keyword/value/comment triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub keyword: String,
    pub value: KeywordValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: impl Into<KeywordValue>) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: value.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Declared kind of an extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionKind {
    Primary,
    BinaryTable,
    AsciiTable,
    Image,
    Other(String),
}

impl ExtensionKind {
    pub fn is_table(&self) -> bool {
        matches!(self, Self::BinaryTable)
    }
}

/// Normalize a keyword or column name for lookup
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Immutable, ordered header of one extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Card>", into = "Vec<Card>")]
pub struct Header {
    cards: Vec<Card>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl From<Vec<Card>> for Header {
    fn from(cards: Vec<Card>) -> Self {
        cards.into_iter().collect()
    }
}

impl From<Header> for Vec<Card> {
    fn from(header: Header) -> Self {
        header.cards
    }
}

impl FromIterator<Card> for Header {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        let mut cards = Vec::new();
        let mut index = HashMap::new();
        for mut card in iter {
            card.keyword = normalize_name(&card.keyword);
            if let KeywordValue::String(s) = &mut card.value {
                let trimmed = s.trim_end().len();
                s.truncate(trimmed);
            }
            // first occurrence wins
            index.entry(card.keyword.clone()).or_insert(cards.len());
            cards.push(card);
        }
        Self { cards, index }
    }
}

impl Header {
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn card(&self, key: &str) -> Option<&Card> {
        self.index
            .get(&normalize_name(key))
            .map(|&i| &self.cards[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.card(key).is_some()
    }

    /// Value of a mandatory keyword
    pub fn value(&self, key: &str) -> Result<&KeywordValue> {
        self.card(key)
            .map(|c| &c.value)
            .ok_or_else(|| OifitsError::MissingKeyword(normalize_name(key)))
    }

    /// Value of an optional keyword
    pub fn value_or<'a>(&'a self, key: &str, default: &'a KeywordValue) -> &'a KeywordValue {
        self.card(key).map(|c| &c.value).unwrap_or(default)
    }

    /// Comment of a mandatory keyword (the keyword may carry no comment)
    pub fn comment(&self, key: &str) -> Result<Option<&str>> {
        self.card(key)
            .map(|c| c.comment.as_deref())
            .ok_or_else(|| OifitsError::MissingKeyword(normalize_name(key)))
    }

    pub fn comment_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.card(key)
            .and_then(|c| c.comment.as_deref())
            .unwrap_or(default)
    }

    /// Value of a mandatory keyword converted to `kind`
    pub fn typed(&self, key: &str, kind: ValueKind) -> Result<KeywordValue> {
        let value = self.value(key)?;
        value.coerce(kind).ok_or_else(|| OifitsError::TypeMismatch {
            keyword: normalize_name(key),
            expected: kind,
            found: value.kind(),
        })
    }

    fn typed_opt(&self, key: &str, kind: ValueKind) -> Result<Option<KeywordValue>> {
        if self.contains(key) {
            self.typed(key, kind).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn integer(&self, key: &str) -> Result<i64> {
        let value = self.value(key)?;
        value.as_integer().ok_or_else(|| mismatch(key, ValueKind::Integer, value))
    }

    pub fn integer_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .typed_opt(key, ValueKind::Integer)?
            .and_then(|v| v.as_integer())
            .unwrap_or(default))
    }

    pub fn real(&self, key: &str) -> Result<f64> {
        let value = self.value(key)?;
        value.as_real().ok_or_else(|| mismatch(key, ValueKind::Real, value))
    }

    pub fn real_or(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self
            .typed_opt(key, ValueKind::Real)?
            .and_then(|v| v.as_real())
            .unwrap_or(default))
    }

    pub fn logical(&self, key: &str) -> Result<bool> {
        let value = self.value(key)?;
        value.as_logical().ok_or_else(|| mismatch(key, ValueKind::Logical, value))
    }

    pub fn logical_or(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self
            .typed_opt(key, ValueKind::Logical)?
            .and_then(|v| v.as_logical())
            .unwrap_or(default))
    }

    pub fn string(&self, key: &str) -> Result<&str> {
        let value = self.value(key)?;
        value.as_str().ok_or_else(|| mismatch(key, ValueKind::String, value))
    }

    pub fn string_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        match self.card(key) {
            Some(card) => card
                .value
                .as_str()
                .ok_or_else(|| mismatch(key, ValueKind::String, &card.value)),
            None => Ok(default),
        }
    }

    /// Kind of extension declared by `XTENSION` (or `SIMPLE` for the primary)
    pub fn kind(&self) -> ExtensionKind {
        match self.card("XTENSION").and_then(|c| c.value.as_str()) {
            Some(name) => match normalize_name(name).as_str() {
                "BINTABLE" => ExtensionKind::BinaryTable,
                "TABLE" => ExtensionKind::AsciiTable,
                "IMAGE" => ExtensionKind::Image,
                other => ExtensionKind::Other(other.to_string()),
            },
            None if self.contains("SIMPLE") => ExtensionKind::Primary,
            None => ExtensionKind::Other(String::new()),
        }
    }

    /// Number of table rows (`NAXIS2`)
    pub fn row_count(&self) -> Result<usize> {
        let rows = self.integer("NAXIS2")?;
        usize::try_from(rows).map_err(|_| {
            ContainerError::Malformed(format!("negative row count {}", rows)).into()
        })
    }

    /// Number of table columns (`TFIELDS`), zero if undeclared
    pub fn column_count(&self) -> Result<usize> {
        Ok(self.integer_or("TFIELDS", 0)?.max(0) as usize)
    }

    /// Normalized column name -> 0-based column index, from the `TTYPEn` cards
    pub fn column_index(&self) -> Result<HashMap<String, usize>> {
        let count = self.column_count()?;
        // walk the cards rather than 1..=TFIELDS, which the file controls
        let mut named: Vec<(usize, &str)> = self
            .index
            .iter()
            .filter_map(|(keyword, &i)| {
                let n: usize = keyword.strip_prefix("TTYPE")?.parse().ok()?;
                let canonical = format!("TTYPE{}", n) == *keyword;
                let name = self.cards[i].value.as_str()?;
                (canonical && (1..=count).contains(&n)).then_some((n, name))
            })
            .collect();
        named.sort_unstable_by_key(|&(n, _)| n);

        let mut map = HashMap::new();
        for (n, name) in named {
            map.entry(normalize_name(name)).or_insert(n - 1);
        }
        Ok(map)
    }

    /// Descriptors of every declared column, in column order
    pub fn column_descriptors(&self) -> Result<Vec<ColumnDescriptor>> {
        (0..self.column_count()?)
            .map(|i| ColumnDescriptor::from_header(self, i))
            .collect()
    }
}

fn mismatch(key: &str, expected: ValueKind, found: &KeywordValue) -> OifitsError {
    OifitsError::TypeMismatch {
        keyword: normalize_name(key),
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        vec![
            Card::new("XTENSION", "BINTABLE"),
            Card::new("naxis2", 4i64),
            Card::new("EXTNAME", "OI_VIS2  ").with_comment("data block"),
            Card::new("OI_REVN", 2i64),
            Card::new("ARRAYX", 1.5),
            Card::new("SIMPLE", true),
            Card::new("TFIELDS", 2i64),
            Card::new("TTYPE1", "time"),
            Card::new("TTYPE2", " FLAG "),
        ]
        .into()
    }

    #[test]
    fn test_keyword_normalization() {
        let header = sample();
        assert_eq!(header.integer("NAXIS2").unwrap(), 4);
        assert_eq!(header.integer(" naxis2").unwrap(), 4);
    }

    #[test]
    fn test_string_values_are_right_trimmed() {
        let header = sample();
        assert_eq!(header.string("EXTNAME").unwrap(), "OI_VIS2");
        assert_eq!(header.comment("EXTNAME").unwrap(), Some("data block"));
        assert_eq!(header.comment("OI_REVN").unwrap(), None);
    }

    #[test]
    fn test_missing_keyword() {
        let header = sample();
        assert!(matches!(
            header.value("INSNAME"),
            Err(OifitsError::MissingKeyword(k)) if k == "INSNAME"
        ));
        assert!(matches!(header.comment("INSNAME"), Err(OifitsError::MissingKeyword(_))));
        assert_eq!(header.comment_or("INSNAME", "none"), "none");
    }

    #[test]
    fn test_defaults_only_apply_when_absent() {
        let header = sample();
        assert_eq!(header.integer_or("NAXIS1", 7).unwrap(), 7);
        assert_eq!(header.string_or("INSNAME", "none").unwrap(), "none");
        // present but of the wrong type is still an error
        assert!(matches!(
            header.integer_or("EXTNAME", 7),
            Err(OifitsError::TypeMismatch { .. })
        ));
        let default = KeywordValue::Integer(0);
        assert_eq!(header.value_or("MISSING", &default), &default);
    }

    #[test]
    fn test_typed_conversions() {
        let header = sample();
        assert_eq!(header.real("OI_REVN").unwrap(), 2.0);
        assert_eq!(header.real("ARRAYX").unwrap(), 1.5);
        match header.integer("ARRAYX") {
            Err(OifitsError::TypeMismatch { expected, found, .. }) => {
                assert_eq!(expected, ValueKind::Integer);
                assert_eq!(found, ValueKind::Real);
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
        assert!(header.logical("SIMPLE").unwrap());
        assert!(header.logical("OI_REVN").is_err());
        assert!(header.string("OI_REVN").is_err());
    }

    #[test]
    fn test_extension_kind() {
        assert_eq!(sample().kind(), ExtensionKind::BinaryTable);
        let primary: Header = vec![Card::new("SIMPLE", true)].into();
        assert_eq!(primary.kind(), ExtensionKind::Primary);
        let image: Header = vec![Card::new("XTENSION", "IMAGE   ")].into();
        assert_eq!(image.kind(), ExtensionKind::Image);
    }

    #[test]
    fn test_column_index() {
        let index = sample().column_index().unwrap();
        assert_eq!(index.get("TIME"), Some(&0));
        assert_eq!(index.get("FLAG"), Some(&1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_column_index_with_huge_tfields() {
        let header: Header = vec![
            Card::new("TFIELDS", i64::MAX),
            Card::new("TTYPE2", "FLAG"),
            Card::new("TTYPE1", "TIME"),
            Card::new("TTYPE3", "TIME"),
            Card::new("TTYPE04", "MJD"),
        ]
        .into();
        let index = header.column_index().unwrap();
        assert_eq!(index.get("TIME"), Some(&0));
        assert_eq!(index.get("FLAG"), Some(&1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let header: Header = vec![Card::new("INSNAME", "A"), Card::new("INSNAME", "B")].into();
        assert_eq!(header.string("INSNAME").unwrap(), "A");
        assert_eq!(header.len(), 2);
    }

    #[test]
    fn test_column_descriptors() {
        let header: Header = vec![
            Card::new("TFIELDS", 2i64),
            Card::new("TTYPE1", "VIS2DATA"),
            Card::new("TFORM1", "6D"),
            Card::new("TDIM1", "(2,3)"),
            Card::new("TTYPE2", "INSNAME"),
            Card::new("TFORM2", "16A"),
        ]
        .into();
        let columns = header.column_descriptors().unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].dims, Some(vec![2, 3]));
        assert_eq!(columns[1].string_len, Some(16));
    }
}
