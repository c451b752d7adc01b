//! OIFITS Inspector CLI
//!
//! Loads JSON container dumps and reports the data-blocks they hold.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use oifits_loader::{load_with_report, Dataset, MemoryContainer, OifitsConfig, SchemaRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oifits-inspect")]
#[command(about = "Inspect OIFITS data-blocks in container dumps")]
struct Cli {
    /// Configuration file (overrides the default search locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a container dump, or every dump under a directory
    Load {
        path: PathBuf,
        /// Suppress per-extension diagnostics
        #[arg(short, long)]
        quiet: bool,
        /// Also report extensions that are not data-blocks
        #[arg(short, long)]
        verbose: bool,
        /// Skip the cross-reference pass
        #[arg(long)]
        no_update: bool,
        /// Print the loaded dataset as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the registered record schemas as JSON
    Schemas {
        /// Only this revision
        #[arg(short, long)]
        revision: Option<u32>,
    },

    /// Show or write the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "oifits.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match OifitsConfig::load_from(cli.config.as_deref().and_then(Path::to_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, mut config: OifitsConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Load {
            path,
            quiet,
            verbose,
            no_update,
            json,
        } => {
            config.load.quiet |= quiet;
            config.load.verbose |= verbose;
            if no_update {
                config.load.update = false;
            }

            let files = collect_dumps(&path)?;
            if files.is_empty() {
                bail!("No container dumps found under {}", path.display());
            }

            let mut warnings = 0;
            for file in &files {
                let mut container = MemoryContainer::open(file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let (dataset, diagnostics) = load_with_report(
                    &mut container,
                    SchemaRegistry::shared(),
                    &config.conventions,
                    &config.load,
                )
                .with_context(|| format!("Failed to load {}", file.display()))?;

                warnings += diagnostics.warning_count();
                if json {
                    println!("{}", serde_json::to_string_pretty(&dataset)?);
                } else {
                    print_summary(file, &dataset)?;
                    if !config.load.quiet && diagnostics.has_warnings() {
                        for item in diagnostics.warnings() {
                            println!("   ⚠️  {}", item);
                        }
                    }
                }
            }

            if !json {
                println!();
                println!("📊 {} file(s), {} warning(s)", files.len(), warnings);
            }
            Ok(())
        }

        Commands::Schemas { revision } => {
            let registry = SchemaRegistry::shared();
            let output = match revision {
                Some(rev) => {
                    let schemas: Vec<_> = registry.schemas(rev).collect();
                    if schemas.is_empty() {
                        bail!(
                            "No schemas registered for revision {} (highest is {})",
                            rev,
                            registry.max_revision()
                        );
                    }
                    serde_json::to_string_pretty(&schemas)?
                }
                None => serde_json::to_string_pretty(registry)?,
            };
            println!("{}", output);
            Ok(())
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                let target = path
                    .to_str()
                    .with_context(|| format!("Non UTF-8 path: {}", path.display()))?;
                OifitsConfig::default().save(target)?;
                println!("✅ Wrote {}", path.display());
                Ok(())
            }
        },
    }
}

/// A single dump, or every `.json` file under a directory
fn collect_dumps(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

fn print_summary(file: &Path, dataset: &Dataset) -> anyhow::Result<()> {
    println!("📁 {}", file.display());
    for (index, record) in dataset.records().iter().enumerate() {
        let mut line = format!(
            "   [{}] ext {:>3}  {:<14} rev {}  {} row(s)",
            index,
            record.extension(),
            record.record_type().to_string(),
            record.revision(),
            record.rows()
        );
        if let Ok(links) = dataset.links(index) {
            for (label, target) in [
                ("array", links.array),
                ("wavelength", links.wavelength),
                ("corr", links.corr),
            ] {
                if let Some(target) = target {
                    line.push_str(&format!("  {}→[{}]", label, target));
                }
            }
        }
        println!("{}", line);
    }
    println!("   🔑 sha256 {}", dataset.digest()?.short());
    Ok(())
}
