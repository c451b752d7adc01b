//! Record Builder
//!
//! Resolves every field of a schema against one extension. Field failures
//! are collected and reported together as one `IncompleteRecord` error once
//! all fields have been tried. Container failures abort immediately.

use std::collections::HashMap;

use crate::column;
use crate::container::Container;
use crate::error::{FieldFailure, OifitsError, Result};
use crate::header::{normalize_name, Header};
use crate::record::{FieldValue, Record};
use crate::registry::{FieldSource, FieldSpec, RecordSchema};

/// Field-level failures of one record build
#[derive(Debug, Default)]
struct Failures(Vec<FieldFailure>);

impl Failures {
    fn push(&mut self, field: &FieldSpec, error: OifitsError) {
        self.0.push(FieldFailure {
            field: field.source_name.clone(),
            error,
        });
    }
}

/// Build a record from the currently selected extension of `container`.
///
/// `position` is the extension's 1-based position, used in diagnostics.
pub fn build_record<C: Container + ?Sized>(
    container: &mut C,
    header: &Header,
    position: usize,
    schema: &RecordSchema,
) -> Result<Record> {
    let mut failures = Failures::default();

    let columns = match header.column_index() {
        Ok(columns) => columns,
        Err(e) => {
            failures.0.push(FieldFailure {
                field: "TFIELDS".to_string(),
                error: e,
            });
            HashMap::new()
        }
    };

    let mut fields = Vec::with_capacity(schema.fields.len());
    for spec in &schema.fields {
        let resolved = match spec.source {
            FieldSource::Keyword => resolve_keyword(header, spec),
            FieldSource::Column => resolve_column(container, header, &columns, spec),
        };
        match resolved {
            Ok(Some(value)) => fields.push((spec.name.clone(), value)),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => failures.push(spec, e),
        }
    }

    if !failures.0.is_empty() {
        return Err(OifitsError::IncompleteRecord {
            extension: position,
            record_type: schema.record_type,
            failures: failures.0,
        });
    }

    Ok(Record::new(schema.record_type, schema.revision, position, fields))
}

fn resolve_keyword(header: &Header, spec: &FieldSpec) -> Result<Option<FieldValue>> {
    if !header.contains(&spec.source_name) {
        return if spec.required {
            Err(OifitsError::MissingKeyword(spec.source_name.clone()))
        } else {
            Ok(None)
        };
    }
    let value = match spec.kind {
        Some(kind) => header.typed(&spec.source_name, kind)?,
        None => header.value(&spec.source_name)?.clone(),
    };
    Ok(Some(FieldValue::Keyword(value)))
}

fn resolve_column<C: Container + ?Sized>(
    container: &mut C,
    header: &Header,
    columns: &HashMap<String, usize>,
    spec: &FieldSpec,
) -> Result<Option<FieldValue>> {
    match columns.get(&normalize_name(&spec.source_name)) {
        Some(&index) => {
            let data = column::read_column(container, header, index)?;
            Ok(Some(FieldValue::Column(data)))
        }
        None if spec.required => Err(OifitsError::MissingColumn(spec.source_name.clone())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{MemoryContainer, MemoryExtension, RawColumn, TableBuilder};
    use crate::registry::{RecordType, SchemaRegistry};
    use crate::value::KeywordValue;

    fn wavelength_table() -> TableBuilder {
        TableBuilder::new(2)
            .oi("OI_WAVELENGTH", 1)
            .keyword("INSNAME", "AMBER  ")
            .column("EFF_WAVE", "E", RawColumn::Float(vec![2.0e-6, 2.2e-6]))
            .column("EFF_BAND", "E", RawColumn::Float(vec![1.0e-7, 1.0e-7]))
    }

    fn build(ext: MemoryExtension, revision: u32, record_type: RecordType) -> Result<Record> {
        let mut container = MemoryContainer::new(vec![MemoryExtension::primary(), ext]);
        container.move_to(2).unwrap();
        let header = container.header().unwrap();
        let schema = SchemaRegistry::shared().get(revision, record_type).unwrap();
        build_record(&mut container, &header, 2, schema)
    }

    #[test]
    fn test_build_wavelength() {
        let record = build(wavelength_table().build(), 1, RecordType::Wavelength).unwrap();
        assert_eq!(record.record_type(), RecordType::Wavelength);
        assert_eq!(record.revision(), 1);
        assert_eq!(record.extension(), 2);
        assert_eq!(record.string("insname"), Some("AMBER"));
        assert_eq!(record.column("eff_wave").unwrap().shape(), &[2]);
        assert_eq!(
            record.field_names().collect::<Vec<_>>(),
            vec!["insname", "eff_wave", "eff_band"]
        );
    }

    #[test]
    fn test_all_failures_are_collected() {
        let ext = TableBuilder::new(2)
            .oi("OI_WAVELENGTH", 1)
            .keyword("INSNAME", 7i64)
            .build();
        match build(ext, 1, RecordType::Wavelength) {
            Err(OifitsError::IncompleteRecord { extension, record_type, failures }) => {
                assert_eq!(extension, 2);
                assert_eq!(record_type, RecordType::Wavelength);
                let names: Vec<_> = failures.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["INSNAME", "EFF_WAVE", "EFF_BAND"]);
                assert!(matches!(failures[0].error, OifitsError::TypeMismatch { .. }));
                assert!(matches!(failures[1].error, OifitsError::MissingColumn(_)));
            }
            other => panic!("Expected IncompleteRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_errors_are_field_failures() {
        let ext = TableBuilder::new(2)
            .oi("OI_WAVELENGTH", 1)
            .keyword("INSNAME", "AMBER")
            .column("EFF_WAVE", "8X", RawColumn::Byte(vec![0, 0]))
            .column("EFF_BAND", "E", RawColumn::Float(vec![1.0, 1.0]))
            .build();
        match build(ext, 1, RecordType::Wavelength) {
            Err(OifitsError::IncompleteRecord { failures, .. }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].field, "EFF_WAVE");
                assert!(matches!(failures[0].error, OifitsError::UnsupportedColumnType { .. }));
            }
            other => panic!("Expected IncompleteRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let ext = TableBuilder::new(1)
            .oi("OI_CORR", 2)
            .keyword("CORRNAME", "C1")
            .keyword("NDATA", 4i64)
            .column("IINDX", "J", RawColumn::Int(vec![1]))
            .column("JINDX", "J", RawColumn::Int(vec![2]))
            .column("CORR", "D", RawColumn::Double(vec![0.5]))
            .build();
        let record = build(ext, 2, RecordType::Corr).unwrap();
        assert_eq!(record.keyword("ndata"), Some(&KeywordValue::Integer(4)));
        assert_eq!(record.fields().len(), 5);
    }

    #[test]
    fn test_keyword_kind_is_coerced() {
        let ext = TableBuilder::new(0)
            .oi("OI_ARRAY", 1)
            .keyword("ARRNAME", "VLTI")
            .keyword("FRAME", "GEOCENTRIC")
            .keyword("ARRAYX", 1942042i64)
            .keyword("ARRAYY", -5455977.0)
            .keyword("ARRAYZ", -2654525.0)
            .column("TEL_NAME", "16A", RawColumn::Text(vec![]))
            .column("STA_NAME", "16A", RawColumn::Text(vec![]))
            .column("STA_INDEX", "I", RawColumn::Short(vec![]))
            .column("DIAMETER", "E", RawColumn::Float(vec![]))
            .column("STAXYZ", "3D", RawColumn::Double(vec![]))
            .build();
        let record = build(ext, 1, RecordType::Array).unwrap();
        assert_eq!(record.keyword("arrayx"), Some(&KeywordValue::Real(1942042.0)));
        assert_eq!(record.column("staxyz").unwrap().shape(), &[3, 0]);
        assert_eq!(record.rows(), 0);
    }
}
