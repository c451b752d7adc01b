//! Extension Classification
//!
//! Decides what one extension is, from its header alone:
//!
//! 1. not a binary table                      -> `NotApplicable`
//! 2. no identity keyword, or a foreign name  -> `NotApplicable`
//!    identity present but not a string       -> `Invalid`
//! 3. prefixed identity no schema knows       -> `Invalid`
//! 4. revision keyword missing or not integer -> `Invalid`
//! 5. revision outside `1..=max_revision`     -> `Invalid`
//! 6. no schema for (revision, identity)      -> `Invalid`
//! 7. otherwise                               -> `Recognized`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::DiagnosticCode;
use crate::error::OifitsError;
use crate::header::{normalize_name, ExtensionKind, Header};
use crate::registry::{Lookup, RecordSchema, RecordType, SchemaRegistry};
use crate::value::{KeywordValue, ValueKind};

/// Header conventions that declare a data-block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conventions {
    /// Keyword holding the record identity
    #[serde(default = "default_identity_keyword")]
    pub identity_keyword: String,
    /// Prefix shared by all record identities
    #[serde(default = "default_identity_prefix")]
    pub identity_prefix: String,
    /// Keyword holding the revision number
    #[serde(default = "default_revision_keyword")]
    pub revision_keyword: String,
}

fn default_identity_keyword() -> String {
    "EXTNAME".to_string()
}

fn default_identity_prefix() -> String {
    "OI_".to_string()
}

fn default_revision_keyword() -> String {
    "OI_REVN".to_string()
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            identity_keyword: default_identity_keyword(),
            identity_prefix: default_identity_prefix(),
            revision_keyword: default_revision_keyword(),
        }
    }
}

/// Why an extension was skipped without a warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    NotATable(ExtensionKind),
    NoIdentity,
    ForeignIdentity(String),
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotATable(kind) => write!(f, "not a binary table ({:?})", kind),
            Self::NoIdentity => write!(f, "no identity keyword"),
            Self::ForeignIdentity(name) => write!(f, "foreign extension {}", name),
        }
    }
}

/// Why an extension that claims to be a data-block was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    IllTypedIdentity(ValueKind),
    UnknownIdentity(String),
    MissingRevision,
    IllTypedRevision(ValueKind),
    UnsupportedRevision {
        identity: String,
        revision: i64,
        max: u32,
    },
    UnregisteredRevision {
        record_type: RecordType,
        revision: u32,
    },
}

impl InvalidReason {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::IllTypedIdentity(_) => DiagnosticCode::IllTypedIdentity,
            Self::UnknownIdentity(_) => DiagnosticCode::UnknownIdentity,
            Self::MissingRevision | Self::IllTypedRevision(_) => DiagnosticCode::BadRevision,
            Self::UnsupportedRevision { .. } => DiagnosticCode::UnsupportedRevision,
            Self::UnregisteredRevision { .. } => DiagnosticCode::UnregisteredRevision,
        }
    }

    /// The error this rejection corresponds to
    pub fn to_error(&self, conventions: &Conventions) -> OifitsError {
        match self {
            Self::IllTypedIdentity(found) => OifitsError::TypeMismatch {
                keyword: conventions.identity_keyword.clone(),
                expected: ValueKind::String,
                found: *found,
            },
            Self::UnknownIdentity(identity) => OifitsError::UnknownRecordIdentity(identity.clone()),
            Self::MissingRevision => {
                OifitsError::MissingKeyword(conventions.revision_keyword.clone())
            }
            Self::IllTypedRevision(found) => OifitsError::TypeMismatch {
                keyword: conventions.revision_keyword.clone(),
                expected: ValueKind::Integer,
                found: *found,
            },
            Self::UnsupportedRevision { identity, revision, .. } => {
                OifitsError::UnsupportedRevision {
                    identity: identity.clone(),
                    revision: *revision,
                }
            }
            Self::UnregisteredRevision { record_type, revision } => {
                OifitsError::UnsupportedRevision {
                    identity: record_type.identity().to_string(),
                    revision: *revision as i64,
                }
            }
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllTypedIdentity(kind) => write!(f, "missing/ill-typed identity ({})", kind),
            Self::UnknownIdentity(name) => write!(f, "unknown record identity {}", name),
            Self::MissingRevision => write!(f, "missing/ill-typed revision (absent)"),
            Self::IllTypedRevision(kind) => write!(f, "missing/ill-typed revision ({})", kind),
            Self::UnsupportedRevision { identity, revision, max } => write!(
                f,
                "unsupported revision {} for {} (highest known is {})",
                revision, identity, max
            ),
            Self::UnregisteredRevision { record_type, revision } => write!(
                f,
                "unknown revision for this record type: {} revision {}",
                record_type, revision
            ),
        }
    }
}

/// Outcome of classifying one extension
#[derive(Debug, Clone, PartialEq)]
pub enum Classification<'a> {
    Recognized {
        record_type: RecordType,
        revision: u32,
        schema: &'a RecordSchema,
    },
    NotApplicable(Skip),
    Invalid(InvalidReason),
}

impl Classification<'_> {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Recognized { .. })
    }
}

/// Classify an extension from its header
pub fn classify<'a>(
    header: &Header,
    registry: &'a SchemaRegistry,
    conventions: &Conventions,
) -> Classification<'a> {
    let kind = header.kind();
    if !kind.is_table() {
        return Classification::NotApplicable(Skip::NotATable(kind));
    }

    let default = KeywordValue::String(String::new());
    let identity = match header.value_or(&conventions.identity_keyword, &default) {
        KeywordValue::String(s) => normalize_name(s),
        other => return Classification::Invalid(InvalidReason::IllTypedIdentity(other.kind())),
    };
    if identity.is_empty() {
        return Classification::NotApplicable(Skip::NoIdentity);
    }
    if !identity.starts_with(&normalize_name(&conventions.identity_prefix)) {
        return Classification::NotApplicable(Skip::ForeignIdentity(identity));
    }

    let record_type = match RecordType::from_identity(&identity) {
        Some(t) if registry.knows(t) => t,
        _ => return Classification::Invalid(InvalidReason::UnknownIdentity(identity)),
    };

    let revision = match header.value(&conventions.revision_keyword) {
        Ok(KeywordValue::Integer(n)) => *n,
        Ok(other) => return Classification::Invalid(InvalidReason::IllTypedRevision(other.kind())),
        Err(_) => return Classification::Invalid(InvalidReason::MissingRevision),
    };

    let max = registry.max_revision();
    let revision = match u32::try_from(revision) {
        Ok(r) if r >= 1 && r <= max => r,
        _ => {
            return Classification::Invalid(InvalidReason::UnsupportedRevision {
                identity,
                revision,
                max,
            })
        }
    };

    match registry.lookup(revision, record_type) {
        Lookup::Found(schema) => Classification::Recognized {
            record_type,
            revision,
            schema,
        },
        Lookup::UnknownRevision | Lookup::UnknownType => {
            Classification::Invalid(InvalidReason::UnregisteredRevision {
                record_type,
                revision,
            })
        }
    }
}
