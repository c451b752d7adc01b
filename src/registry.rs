//! Schema Registry
//!
//! Read-only table of record schemas keyed by (revision, record type).
//! The built-in registry carries OIFITS revisions 1 and 2; it is built once
//! and shared by reference between loads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::value::ValueKind;

/// Known data-block kinds, one per `EXTNAME` identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "OI_TARGET")]
    Target,
    #[serde(rename = "OI_ARRAY")]
    Array,
    #[serde(rename = "OI_WAVELENGTH")]
    Wavelength,
    #[serde(rename = "OI_VIS")]
    Vis,
    #[serde(rename = "OI_VIS2")]
    Vis2,
    #[serde(rename = "OI_T3")]
    T3,
    #[serde(rename = "OI_FLUX")]
    Flux,
    #[serde(rename = "OI_CORR")]
    Corr,
    #[serde(rename = "OI_INSPOL")]
    InsPol,
}

impl RecordType {
    pub const ALL: [RecordType; 9] = [
        Self::Target,
        Self::Array,
        Self::Wavelength,
        Self::Vis,
        Self::Vis2,
        Self::T3,
        Self::Flux,
        Self::Corr,
        Self::InsPol,
    ];

    /// The `EXTNAME` that declares this record type
    pub fn identity(&self) -> &'static str {
        match self {
            Self::Target => "OI_TARGET",
            Self::Array => "OI_ARRAY",
            Self::Wavelength => "OI_WAVELENGTH",
            Self::Vis => "OI_VIS",
            Self::Vis2 => "OI_VIS2",
            Self::T3 => "OI_T3",
            Self::Flux => "OI_FLUX",
            Self::Corr => "OI_CORR",
            Self::InsPol => "OI_INSPOL",
        }
    }

    /// Look up a normalized identity
    pub fn from_identity(identity: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.identity() == identity)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identity())
    }
}

/// Where a field's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Keyword,
    Column,
}

/// Declaration of one logical field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Logical field name (e.g. `date_obs`)
    pub name: String,
    pub source: FieldSource,
    /// Keyword or column name in the extension (e.g. `DATE-OBS`)
    pub source_name: String,
    pub required: bool,
    /// Declared kind of a keyword field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueKind>,
}

impl FieldSpec {
    fn new(source_name: &str, source: FieldSource, required: bool, kind: Option<ValueKind>) -> Self {
        Self {
            name: source_name.to_ascii_lowercase().replace('-', "_"),
            source,
            source_name: source_name.to_string(),
            required,
            kind,
        }
    }
}

/// Ordered field layout of one (revision, record type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub record_type: RecordType,
    pub revision: u32,
    /// At most one record of this type per dataset
    #[serde(default)]
    pub singleton: bool,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(record_type: RecordType, revision: u32) -> Self {
        Self {
            record_type,
            revision,
            singleton: false,
            fields: Vec::new(),
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn keyword(mut self, name: &str, kind: ValueKind) -> Self {
        self.fields.push(FieldSpec::new(name, FieldSource::Keyword, true, Some(kind)));
        self
    }

    pub fn optional_keyword(mut self, name: &str, kind: ValueKind) -> Self {
        self.fields.push(FieldSpec::new(name, FieldSource::Keyword, false, Some(kind)));
        self
    }

    pub fn columns(mut self, names: &[&str]) -> Self {
        for name in names {
            self.fields.push(FieldSpec::new(name, FieldSource::Column, true, None));
        }
        self
    }

    pub fn optional_columns(mut self, names: &[&str]) -> Self {
        for name in names {
            self.fields.push(FieldSpec::new(name, FieldSource::Column, false, None));
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// Result of a registry lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a RecordSchema),
    /// No schema at all is registered for this revision
    UnknownRevision,
    /// The revision exists but does not define this record type
    UnknownType,
}

/// Versioned record schemas
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRegistry {
    revisions: BTreeMap<u32, BTreeMap<RecordType, RecordSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema while constructing a registry
    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.revisions
            .entry(schema.revision)
            .or_default()
            .insert(schema.record_type, schema);
        self
    }

    /// Process-wide built-in registry, built on first use
    pub fn shared() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    /// OIFITS revisions 1 and 2
    pub fn builtin() -> Self {
        revision_1()
            .into_iter()
            .chain(revision_2())
            .fold(Self::new(), Self::with_schema)
    }

    /// Highest registered revision, 0 when empty
    pub fn max_revision(&self) -> u32 {
        self.revisions.keys().next_back().copied().unwrap_or(0)
    }

    pub fn revisions(&self) -> impl Iterator<Item = u32> + '_ {
        self.revisions.keys().copied()
    }

    pub fn lookup(&self, revision: u32, record_type: RecordType) -> Lookup<'_> {
        match self.revisions.get(&revision) {
            None => Lookup::UnknownRevision,
            Some(schemas) => schemas
                .get(&record_type)
                .map(Lookup::Found)
                .unwrap_or(Lookup::UnknownType),
        }
    }

    pub fn get(&self, revision: u32, record_type: RecordType) -> Option<&RecordSchema> {
        match self.lookup(revision, record_type) {
            Lookup::Found(schema) => Some(schema),
            _ => None,
        }
    }

    /// Whether any revision defines `record_type`
    pub fn knows(&self, record_type: RecordType) -> bool {
        self.revisions.values().any(|s| s.contains_key(&record_type))
    }

    /// All schemas of one revision, in record type order
    pub fn schemas(&self, revision: u32) -> impl Iterator<Item = &RecordSchema> {
        self.revisions.get(&revision).into_iter().flat_map(|s| s.values())
    }

    /// Whether records of this type are limited to one per dataset
    pub fn is_singleton(&self, record_type: RecordType) -> bool {
        self.revisions
            .values()
            .filter_map(|s| s.get(&record_type))
            .any(|s| s.singleton)
    }
}

use ValueKind::{Integer, Real, String as Text};

const TARGET_COLUMNS: &[&str] = &[
    "TARGET_ID", "TARGET", "RAEP0", "DECEP0", "EQUINOX", "RA_ERR", "DEC_ERR", "SYSVEL",
    "VELTYP", "VELDEF", "PMRA", "PMDEC", "PMRA_ERR", "PMDEC_ERR", "PARALLAX", "PARA_ERR",
    "SPECTYP",
];
const ARRAY_COLUMNS: &[&str] = &["TEL_NAME", "STA_NAME", "STA_INDEX", "DIAMETER", "STAXYZ"];
const WAVELENGTH_COLUMNS: &[&str] = &["EFF_WAVE", "EFF_BAND"];
const VIS_COLUMNS: &[&str] = &[
    "TARGET_ID", "TIME", "MJD", "INT_TIME", "VISAMP", "VISAMPERR", "VISPHI", "VISPHIERR",
    "UCOORD", "VCOORD", "STA_INDEX", "FLAG",
];
const VIS2_COLUMNS: &[&str] = &[
    "TARGET_ID", "TIME", "MJD", "INT_TIME", "VIS2DATA", "VIS2ERR", "UCOORD", "VCOORD",
    "STA_INDEX", "FLAG",
];
const T3_COLUMNS: &[&str] = &[
    "TARGET_ID", "TIME", "MJD", "INT_TIME", "T3AMP", "T3AMPERR", "T3PHI", "T3PHIERR",
    "U1COORD", "V1COORD", "U2COORD", "V2COORD", "STA_INDEX", "FLAG",
];

fn revision_1() -> Vec<RecordSchema> {
    use RecordType as T;
    vec![
        RecordSchema::new(T::Target, 1).singleton().columns(TARGET_COLUMNS),
        RecordSchema::new(T::Array, 1)
            .keyword("ARRNAME", Text)
            .keyword("FRAME", Text)
            .keyword("ARRAYX", Real)
            .keyword("ARRAYY", Real)
            .keyword("ARRAYZ", Real)
            .columns(ARRAY_COLUMNS),
        RecordSchema::new(T::Wavelength, 1)
            .keyword("INSNAME", Text)
            .columns(WAVELENGTH_COLUMNS),
        RecordSchema::new(T::Vis, 1)
            .keyword("DATE-OBS", Text)
            .optional_keyword("ARRNAME", Text)
            .keyword("INSNAME", Text)
            .columns(VIS_COLUMNS),
        RecordSchema::new(T::Vis2, 1)
            .keyword("DATE-OBS", Text)
            .optional_keyword("ARRNAME", Text)
            .keyword("INSNAME", Text)
            .columns(VIS2_COLUMNS),
        RecordSchema::new(T::T3, 1)
            .keyword("DATE-OBS", Text)
            .optional_keyword("ARRNAME", Text)
            .keyword("INSNAME", Text)
            .columns(T3_COLUMNS),
    ]
}

fn revision_2() -> Vec<RecordSchema> {
    use RecordType as T;
    vec![
        RecordSchema::new(T::Target, 2)
            .singleton()
            .columns(TARGET_COLUMNS)
            .optional_columns(&["CATEGORY"]),
        RecordSchema::new(T::Array, 2)
            .keyword("ARRNAME", Text)
            .keyword("FRAME", Text)
            .keyword("ARRAYX", Real)
            .keyword("ARRAYY", Real)
            .keyword("ARRAYZ", Real)
            .columns(ARRAY_COLUMNS)
            .columns(&["FOV", "FOVTYPE"]),
        RecordSchema::new(T::Wavelength, 2)
            .keyword("INSNAME", Text)
            .columns(WAVELENGTH_COLUMNS),
        RecordSchema::new(T::Vis, 2)
            .keyword("DATE-OBS", Text)
            .keyword("ARRNAME", Text)
            .keyword("INSNAME", Text)
            .optional_keyword("CORRNAME", Text)
            .optional_keyword("AMPTYP", Text)
            .optional_keyword("PHITYP", Text)
            .optional_keyword("AMPORDER", Integer)
            .optional_keyword("PHIORDER", Integer)
            .columns(VIS_COLUMNS)
            .optional_columns(&[
                "CORRINDX_VISAMP", "CORRINDX_VISPHI", "VISREFMAP", "RVIS", "RVISERR", "IVIS",
                "IVISERR", "CORRINDX_RVIS", "CORRINDX_IVIS",
            ]),
        RecordSchema::new(T::Vis2, 2)
            .keyword("DATE-OBS", Text)
            .keyword("ARRNAME", Text)
            .keyword("INSNAME", Text)
            .optional_keyword("CORRNAME", Text)
            .columns(VIS2_COLUMNS)
            .optional_columns(&["CORRINDX_VIS2DATA"]),
        RecordSchema::new(T::T3, 2)
            .keyword("DATE-OBS", Text)
            .keyword("ARRNAME", Text)
            .keyword("INSNAME", Text)
            .optional_keyword("CORRNAME", Text)
            .columns(T3_COLUMNS)
            .optional_columns(&["CORRINDX_T3AMP", "CORRINDX_T3PHI"]),
        RecordSchema::new(T::Flux, 2)
            .keyword("DATE-OBS", Text)
            .keyword("INSNAME", Text)
            .optional_keyword("ARRNAME", Text)
            .optional_keyword("CORRNAME", Text)
            .optional_keyword("FOV", Real)
            .optional_keyword("FOVTYPE", Text)
            .keyword("CALSTAT", Text)
            .columns(&["TARGET_ID", "MJD", "INT_TIME", "FLUXDATA", "FLUXERR"])
            .optional_columns(&["CORRINDX_FLUXDATA", "STA_INDEX"])
            .columns(&["FLAG"]),
        RecordSchema::new(T::Corr, 2)
            .keyword("CORRNAME", Text)
            .keyword("NDATA", Integer)
            .columns(&["IINDX", "JINDX", "CORR"]),
        RecordSchema::new(T::InsPol, 2)
            .keyword("DATE-OBS", Text)
            .keyword("NPOL", Integer)
            .keyword("ORIENT", Text)
            .keyword("MODEL", Text)
            .keyword("ARRNAME", Text)
            .columns(&[
                "TARGET_ID", "INSNAME", "MJD_OBS", "MJD_END", "JXX", "JYY", "JXY", "JYX",
                "STA_INDEX",
            ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_revisions() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.max_revision(), 2);
        assert_eq!(registry.revisions().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(registry.schemas(1).count(), 6);
        assert_eq!(registry.schemas(2).count(), 9);
    }

    #[test]
    fn test_lookup_distinguishes_unknown_cases() {
        let registry = SchemaRegistry::builtin();
        assert!(matches!(registry.lookup(1, RecordType::Vis2), Lookup::Found(_)));
        assert_eq!(registry.lookup(1, RecordType::Flux), Lookup::UnknownType);
        assert_eq!(registry.lookup(3, RecordType::Vis2), Lookup::UnknownRevision);
        assert!(registry.knows(RecordType::Flux));
        assert!(!SchemaRegistry::new().knows(RecordType::Flux));
    }

    #[test]
    fn test_identity_table() {
        for t in RecordType::ALL {
            assert_eq!(RecordType::from_identity(t.identity()), Some(t));
        }
        assert_eq!(RecordType::from_identity("OI_FOO"), None);
        assert_eq!(RecordType::from_identity("oi_vis"), None);
    }

    #[test]
    fn test_field_names() {
        let registry = SchemaRegistry::builtin();
        let vis2 = registry.get(2, RecordType::Vis2).unwrap();
        let date = vis2.field("date_obs").unwrap();
        assert_eq!(date.source, FieldSource::Keyword);
        assert_eq!(date.source_name, "DATE-OBS");
        assert!(date.required);
        assert!(!vis2.field("corrname").unwrap().required);
        assert_eq!(vis2.field("vis2data").unwrap().source, FieldSource::Column);
    }

    #[test]
    fn test_arrname_becomes_mandatory_in_revision_2() {
        let registry = SchemaRegistry::builtin();
        assert!(!registry.get(1, RecordType::Vis).unwrap().field("arrname").unwrap().required);
        assert!(registry.get(2, RecordType::Vis).unwrap().field("arrname").unwrap().required);
    }

    #[test]
    fn test_singletons() {
        let registry = SchemaRegistry::builtin();
        assert!(registry.is_singleton(RecordType::Target));
        assert!(!registry.is_singleton(RecordType::Vis2));
    }

    #[test]
    fn test_shared_is_builtin() {
        let shared = SchemaRegistry::shared();
        assert_eq!(shared.max_revision(), SchemaRegistry::builtin().max_revision());
        assert!(std::ptr::eq(shared, SchemaRegistry::shared()));
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(SchemaRegistry::builtin()).unwrap();
        let fields = &json["revisions"]["2"]["OI_CORR"]["fields"];
        assert_eq!(fields[0]["source_name"], "CORRNAME");
        assert_eq!(fields[0]["kind"], "string");
    }
}
