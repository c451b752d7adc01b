//! Master dataset
//!
//! Records accumulate in extension order through [`Dataset::attach`]. Once
//! every extension has been consumed, [`Dataset::update`] resolves the
//! name-based references between records; until then cross-reference
//! queries fail with `NotFinalized`.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::checksum::Checksum;
use crate::error::{OifitsError, Result};
use crate::record::{Links, Record};
use crate::registry::{RecordType, SchemaRegistry};

/// Reference kinds resolved by `update`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LinkKind {
    Array,
    Wavelength,
    Corr,
}

impl LinkKind {
    const ALL: [LinkKind; 3] = [Self::Array, Self::Wavelength, Self::Corr];

    /// Record field holding the referenced name
    pub fn field(&self) -> &'static str {
        match self {
            Self::Array => "arrname",
            Self::Wavelength => "insname",
            Self::Corr => "corrname",
        }
    }

    /// Record type a reference points at
    pub fn target(&self) -> RecordType {
        match self {
            Self::Array => RecordType::Array,
            Self::Wavelength => RecordType::Wavelength,
            Self::Corr => RecordType::Corr,
        }
    }
}

/// A reference that names no record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedLink {
    /// Index of the referring record
    pub record: usize,
    /// Source extension of the referring record
    pub extension: usize,
    pub kind: LinkKind,
    pub name: String,
}

/// Outcome of one `update` pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub linked: usize,
    pub unresolved: Vec<UnresolvedLink>,
}

/// All records loaded from one container
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    records: Vec<Record>,
    #[serde(skip)]
    by_type: HashMap<RecordType, Vec<usize>>,
    #[serde(skip)]
    singletons: BTreeSet<RecordType>,
    finalized: bool,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    /// Empty dataset using the cardinality rules of the built-in registry
    pub fn new() -> Self {
        Self::for_registry(SchemaRegistry::shared())
    }

    /// Empty dataset using the cardinality rules of `registry`
    pub fn for_registry(registry: &SchemaRegistry) -> Self {
        Self {
            records: Vec::new(),
            by_type: HashMap::new(),
            singletons: RecordType::ALL
                .into_iter()
                .filter(|t| registry.is_singleton(*t))
                .collect(),
            finalized: false,
        }
    }

    /// Append a record.
    ///
    /// Attaching to a finalized dataset clears the finalized state; run
    /// `update` again afterwards.
    pub fn attach(&mut self, record: Record) -> Result<()> {
        let record_type = record.record_type();
        let indices = self.by_type.entry(record_type).or_default();
        if self.singletons.contains(&record_type) && !indices.is_empty() {
            return Err(OifitsError::DuplicateSingleton(record_type));
        }
        indices.push(self.records.len());
        self.records.push(record);
        self.finalized = false;
        Ok(())
    }

    /// Resolve name-based references between records.
    ///
    /// Links are recomputed from scratch on every call.
    pub fn update(&mut self) -> UpdateSummary {
        let mut names: HashMap<(RecordType, &str), usize> = HashMap::new();
        for kind in LinkKind::ALL {
            for &i in self.by_type.get(&kind.target()).into_iter().flatten() {
                if let Some(name) = self.records[i].string(kind.field()) {
                    names.entry((kind.target(), name)).or_insert(i);
                }
            }
        }

        let mut summary = UpdateSummary::default();
        let mut resolved = Vec::with_capacity(self.records.len());
        for (i, record) in self.records.iter().enumerate() {
            let mut links = Links::default();
            for kind in LinkKind::ALL {
                if record.record_type() == kind.target() {
                    continue;
                }
                let Some(name) = record.string(kind.field()) else {
                    continue;
                };
                match names.get(&(kind.target(), name)) {
                    Some(&target) => {
                        match kind {
                            LinkKind::Array => links.array = Some(target),
                            LinkKind::Wavelength => links.wavelength = Some(target),
                            LinkKind::Corr => links.corr = Some(target),
                        }
                        summary.linked += 1;
                    }
                    None => summary.unresolved.push(UnresolvedLink {
                        record: i,
                        extension: record.extension(),
                        kind,
                        name: name.to_string(),
                    }),
                }
            }
            resolved.push(links);
        }

        for (record, links) in self.records.iter_mut().zip(resolved) {
            record.set_links(links);
        }
        self.finalized = true;
        debug!(
            records = self.records.len(),
            linked = summary.linked,
            unresolved = summary.unresolved.len(),
            "dataset updated"
        );
        summary
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one type, in extension order
    pub fn of_type(&self, record_type: RecordType) -> impl Iterator<Item = &Record> {
        self.by_type
            .get(&record_type)
            .into_iter()
            .flatten()
            .map(|&i| &self.records[i])
    }

    pub fn count(&self, record_type: RecordType) -> usize {
        self.by_type.get(&record_type).map_or(0, Vec::len)
    }

    /// The `OI_TARGET` record, if any
    pub fn target(&self) -> Option<&Record> {
        self.of_type(RecordType::Target).next()
    }

    /// SHA256 of the dataset's JSON form, links included
    pub fn digest(&self) -> Result<Checksum> {
        Checksum::of(self)
    }

    /// Resolved references of record `index`
    pub fn links(&self, index: usize) -> Result<Links> {
        if !self.finalized {
            return Err(OifitsError::NotFinalized);
        }
        Ok(self.records.get(index).map(Record::links).unwrap_or_default())
    }

    /// Record referenced by record `index` through `kind`
    pub fn linked(&self, index: usize, kind: LinkKind) -> Result<Option<&Record>> {
        let links = self.links(index)?;
        let target = match kind {
            LinkKind::Array => links.array,
            LinkKind::Wavelength => links.wavelength,
            LinkKind::Corr => links.corr,
        };
        Ok(target.and_then(|i| self.records.get(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn record(record_type: RecordType, extension: usize, names: &[(&str, &str)]) -> Record {
        let fields = names
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Keyword((*v).into())))
            .collect();
        Record::new(record_type, 2, extension, fields)
    }

    fn sample() -> Dataset {
        let mut ds = Dataset::new();
        ds.attach(record(RecordType::Target, 2, &[])).unwrap();
        ds.attach(record(RecordType::Array, 3, &[("arrname", "VLTI")])).unwrap();
        ds.attach(record(RecordType::Wavelength, 4, &[("insname", "GRAVITY")])).unwrap();
        ds.attach(record(
            RecordType::Vis2,
            5,
            &[("arrname", "VLTI"), ("insname", "GRAVITY"), ("corrname", "NOPE")],
        ))
        .unwrap();
        ds
    }

    #[test]
    fn test_attach_indexes_by_type() {
        let ds = sample();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.count(RecordType::Vis2), 1);
        assert_eq!(ds.count(RecordType::T3), 0);
        assert_eq!(ds.of_type(RecordType::Array).next().unwrap().extension(), 3);
        assert!(ds.target().is_some());
    }

    #[test]
    fn test_duplicate_singleton() {
        let mut ds = sample();
        let err = ds.attach(record(RecordType::Target, 6, &[])).unwrap_err();
        assert!(matches!(err, OifitsError::DuplicateSingleton(RecordType::Target)));
        assert_eq!(ds.len(), 4);
        // non-singletons may repeat
        ds.attach(record(RecordType::Array, 7, &[("arrname", "CHARA")])).unwrap();
    }

    #[test]
    fn test_links_require_update() {
        let mut ds = sample();
        assert!(matches!(ds.links(3), Err(OifitsError::NotFinalized)));
        let summary = ds.update();
        assert!(ds.is_finalized());
        assert_eq!(summary.linked, 2);
        assert_eq!(summary.unresolved.len(), 1);
        assert_eq!(summary.unresolved[0].kind, LinkKind::Corr);
        assert_eq!(summary.unresolved[0].name, "NOPE");

        let links = ds.links(3).unwrap();
        assert_eq!(links.array, Some(1));
        assert_eq!(links.wavelength, Some(2));
        assert_eq!(links.corr, None);
        assert_eq!(
            ds.linked(3, LinkKind::Wavelength).unwrap().unwrap().string("insname"),
            Some("GRAVITY")
        );
        // definition records do not link to themselves
        assert_eq!(ds.links(1).unwrap(), Links::default());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut ds = sample();
        let first = ds.update();
        let snapshot = ds.records().to_vec();
        let digest = ds.digest().unwrap();
        let second = ds.update();
        assert_eq!(first, second);
        assert_eq!(ds.records(), &snapshot[..]);
        assert_eq!(ds.digest().unwrap(), digest);
    }

    #[test]
    fn test_update_empty_dataset() {
        let mut ds = Dataset::new();
        let summary = ds.update();
        assert_eq!(summary, UpdateSummary::default());
        assert!(ds.is_finalized());
        assert!(ds.is_empty());
    }

    #[test]
    fn test_attach_after_update_clears_finalized() {
        let mut ds = sample();
        ds.update();
        ds.attach(record(RecordType::T3, 8, &[])).unwrap();
        assert!(!ds.is_finalized());
        assert!(ds.links(0).is_err());
    }
}
