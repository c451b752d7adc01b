//! Container loader
//!
//! Walks every extension after the first, classifies it, builds a record
//! for recognized extensions and attaches it to a [`Dataset`]. Problems with
//! one extension are reported and the extension is skipped; only container
//! failures abort the load.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::builder::build_record;
use crate::classify::{classify, Classification, Conventions};
use crate::container::Container;
use crate::dataset::{Dataset, UpdateSummary};
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::error::{OifitsError, Result};
use crate::registry::SchemaRegistry;

/// Options for one load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Suppress per-extension log output
    #[serde(default)]
    pub quiet: bool,
    /// Run the `update` pass once every extension has been consumed
    #[serde(default = "default_true")]
    pub update: bool,
    /// Also report extensions that are not data-blocks
    #[serde(default)]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            update: true,
            verbose: false,
        }
    }
}

impl LoadOptions {
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }
}

/// Load every data-block of `container`
pub fn load<C: Container + ?Sized>(
    container: &mut C,
    registry: &SchemaRegistry,
    options: &LoadOptions,
) -> Result<Dataset> {
    load_with_report(container, registry, &Conventions::default(), options).map(|(ds, _)| ds)
}

/// Load every data-block of `container`, returning the diagnostics as well
pub fn load_with_report<C: Container + ?Sized>(
    container: &mut C,
    registry: &SchemaRegistry,
    conventions: &Conventions,
    options: &LoadOptions,
) -> Result<(Dataset, Diagnostics)> {
    let mut report = Report::new(options);
    let mut dataset = Dataset::for_registry(registry);

    let count = container.extension_count();
    debug!(extensions = count, "loading container");

    for position in 2..=count {
        container.move_to(position)?;
        let header = container.header()?;

        let (record_type, schema) = match classify(&header, registry, conventions) {
            Classification::Recognized { record_type, schema, .. } => (record_type, schema),
            Classification::NotApplicable(skip) => {
                if options.verbose {
                    report.push(DiagnosticItem::new(
                        position,
                        DiagnosticCode::NotApplicable,
                        skip.to_string(),
                    ));
                }
                continue;
            }
            Classification::Invalid(reason) => {
                report.push(DiagnosticItem::new(position, reason.code(), reason.to_string()));
                continue;
            }
        };

        let record = match build_record(container, &header, position, schema) {
            Ok(record) => record,
            Err(OifitsError::IncompleteRecord { failures, .. }) => {
                let mut item = DiagnosticItem::new(
                    position,
                    DiagnosticCode::IncompleteRecord,
                    format!("incomplete {} record", record_type),
                );
                for failure in &failures {
                    item = item.with_context(failure.to_string());
                }
                report.push(item);
                continue;
            }
            Err(e) => return Err(e),
        };

        match dataset.attach(record) {
            Ok(()) => report.push(DiagnosticItem::new(
                position,
                DiagnosticCode::Recognized,
                format!("{} revision {}", record_type, schema.revision),
            )),
            Err(e @ OifitsError::DuplicateSingleton(_)) => {
                report.push(DiagnosticItem::new(
                    position,
                    DiagnosticCode::DuplicateSingleton,
                    e.to_string(),
                ));
            }
            Err(e) => return Err(e),
        }
    }

    if options.update {
        let summary = dataset.update();
        report.unresolved(&summary);
    }

    Ok((dataset, report.finish()))
}

/// Diagnostics sink that mirrors each item to the log unless quiet
struct Report {
    quiet: bool,
    diagnostics: Diagnostics,
}

impl Report {
    fn new(options: &LoadOptions) -> Self {
        Self {
            quiet: options.quiet,
            diagnostics: Diagnostics::new(),
        }
    }

    fn push(&mut self, item: DiagnosticItem) {
        if !self.quiet {
            match item.code {
                DiagnosticCode::Recognized => {
                    info!(extension = item.extension, "{}", item.message)
                }
                DiagnosticCode::NotApplicable => {
                    debug!(extension = item.extension, "skipped: {}", item.message)
                }
                code => warn!(
                    extension = item.extension,
                    code = code.as_str(),
                    "{}{}",
                    item.message,
                    Context(&item.context)
                ),
            }
        }
        self.diagnostics.push(item);
    }

    fn unresolved(&mut self, summary: &UpdateSummary) {
        for link in &summary.unresolved {
            self.push(DiagnosticItem::new(
                link.extension,
                DiagnosticCode::UnresolvedLink,
                format!(
                    "{} {:?} matches no {} record",
                    link.kind.field().to_uppercase(),
                    link.name,
                    link.kind.target()
                ),
            ));
        }
    }

    fn finish(self) -> Diagnostics {
        self.diagnostics
    }
}

struct Context<'a>(&'a [String]);

impl std::fmt::Display for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for ctx in self.0 {
            write!(f, "; {}", ctx)?;
        }
        Ok(())
    }
}
