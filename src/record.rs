//! Records built from recognized extensions

use serde::Serialize;

use crate::column::ColumnData;
use crate::registry::RecordType;
use crate::value::KeywordValue;

/// Resolved value of one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Keyword(KeywordValue),
    Column(ColumnData),
}

impl FieldValue {
    pub fn as_keyword(&self) -> Option<&KeywordValue> {
        match self {
            Self::Keyword(v) => Some(v),
            Self::Column(_) => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnData> {
        match self {
            Self::Column(c) => Some(c),
            Self::Keyword(_) => None,
        }
    }
}

/// Name-based references between records, filled in by `Dataset::update`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Links {
    /// Index of the `OI_ARRAY` record matching `ARRNAME`
    pub array: Option<usize>,
    /// Index of the `OI_WAVELENGTH` record matching `INSNAME`
    pub wavelength: Option<usize>,
    /// Index of the `OI_CORR` record matching `CORRNAME`
    pub corr: Option<usize>,
}

/// One data-block.
///
/// Holds exactly the fields of its schema that were present in the
/// extension, in schema order. Only the links change after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    record_type: RecordType,
    revision: u32,
    /// 1-based position of the source extension
    extension: usize,
    fields: Vec<(String, FieldValue)>,
    #[serde(skip_serializing_if = "links_unset")]
    links: Links,
}

fn links_unset(links: &Links) -> bool {
    *links == Links::default()
}

impl Record {
    pub(crate) fn new(
        record_type: RecordType,
        revision: u32,
        extension: usize,
        fields: Vec<(String, FieldValue)>,
    ) -> Self {
        Self {
            record_type,
            revision,
            extension,
            fields,
            links: Links::default(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn extension(&self) -> usize {
        self.extension
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn keyword(&self, name: &str) -> Option<&KeywordValue> {
        self.get(name).and_then(FieldValue::as_keyword)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.get(name).and_then(FieldValue::as_column)
    }

    /// String keyword value
    pub fn string(&self, name: &str) -> Option<&str> {
        self.keyword(name).and_then(KeywordValue::as_str)
    }

    /// Row count of the source table, taken from the first column field
    pub fn rows(&self) -> usize {
        self.fields
            .iter()
            .find_map(|(_, v)| v.as_column())
            .map(ColumnData::rows)
            .unwrap_or(0)
    }

    pub(crate) fn links(&self) -> Links {
        self.links
    }

    pub(crate) fn set_links(&mut self, links: Links) {
        self.links = links;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NdArray;

    #[test]
    fn test_field_access() {
        let record = Record::new(
            RecordType::Wavelength,
            1,
            2,
            vec![
                ("insname".into(), FieldValue::Keyword("PIONIER".into())),
                (
                    "eff_wave".into(),
                    FieldValue::Column(ColumnData::Real(NdArray::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap())),
                ),
            ],
        );
        assert_eq!(record.string("insname"), Some("PIONIER"));
        assert!(record.column("insname").is_none());
        assert_eq!(record.column("eff_wave").unwrap().shape(), &[3]);
        assert_eq!(record.rows(), 3);
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["insname", "eff_wave"]);
        assert!(record.get("eff_band").is_none());
    }
}
