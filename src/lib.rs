//! OIFITS Loader
//!
//! Schema-driven loading of OIFITS interferometry data-blocks from binary
//! table containers.
//!
//! ## Features
//!
//! - **Versioned Schemas**: OIFITS revisions 1 and 2 in a read-only registry
//! - **Classification**: Each extension is recognized, skipped, or rejected from its header alone
//! - **Typed Decoding**: Columns decode to shaped arrays, first axis fastest, rows last
//! - **Aggregated Failures**: Every missing or malformed field of an extension is reported at once
//! - **Diagnostics**: Skipped and rejected extensions are collected, never fatal
//!
//! ## Architecture
//!
//! ```text
//! Container ──move_to/header──▶ classify ──Recognized──▶ build_record ──▶ Dataset::attach
//!     │                            │                          │
//!     │                      SchemaRegistry              column::read_column
//!     └──────────read_column──────────────────────────────────┘
//!                                                   Dataset::update (links by name)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use oifits_loader::{load, LoadOptions, MemoryContainer, SchemaRegistry};
//!
//! let mut container = MemoryContainer::open("observation.json")?;
//! let dataset = load(&mut container, SchemaRegistry::shared(), &LoadOptions::default())?;
//! for record in dataset.records() {
//!     println!("{} from extension {}", record.record_type(), record.extension());
//! }
//! # Ok::<(), oifits_loader::OifitsError>(())
//! ```

pub mod builder;
pub mod checksum;
pub mod classify;
pub mod column;
pub mod config;
pub mod container;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod header;
pub mod loader;
pub mod record;
pub mod registry;
pub mod value;

pub use checksum::Checksum;
pub use classify::{classify, Classification, Conventions};
pub use column::{ColumnData, ColumnDescriptor, ElementType};
pub use config::OifitsConfig;
pub use container::{Container, MemoryContainer, MemoryExtension, RawColumn, TableBuilder};
pub use dataset::{Dataset, LinkKind, UpdateSummary};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use error::{ContainerError, OifitsError, Result};
pub use header::{Card, ExtensionKind, Header};
pub use loader::{load, load_with_report, LoadOptions};
pub use record::{FieldValue, Links, Record};
pub use registry::{RecordSchema, RecordType, SchemaRegistry};
pub use value::{Complex64, KeywordValue, NdArray, ValueKind};
