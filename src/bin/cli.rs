use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::debug;

use ca_compounding::config::{self, ExplorerConfig};
use ca_compounding::export::{export_counts, export_records, write_counts};
use ca_compounding::prelude::*;

const NO_MATCHES: &str = "No pharmacies match the selected filters.";

#[derive(Parser)]
#[command(name = "cpcli")]
#[command(about = "California compounding pharmacy explorer - vocabularies, facet filters and counts", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config location)
    #[arg(long, global = true, env = "COMPOUNDING_CONFIG")]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show summary statistics for a dataset
    Stats(DataArgs),
    /// List the selectable options of a facet column
    Vocab(VocabArgs),
    /// Count rows per value of a column
    Counts(CountsArgs),
    /// Filter pharmacies by facet selections
    Search(SearchArgs),
    /// Export filtered rows to JSON, JSON Lines or CSV
    Export(ExportArgs),
}

#[derive(Args)]
struct DataArgs {
    /// Directory containing all_pharmacies.csv (falls back to the configured data_dir)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Args)]
struct VocabArgs {
    #[command(flatten)]
    data: DataArgs,
    /// Column name, e.g. Specialties or City
    #[arg(short, long)]
    column: String,
}

#[derive(Args)]
struct CountsArgs {
    #[command(flatten)]
    data: DataArgs,
    /// Column name, e.g. License Type, County or Purchasing Style
    #[arg(short, long)]
    column: String,
    #[command(flatten)]
    filters: FilterArgs,
    /// Write the table to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
}

#[derive(Args)]
struct FilterArgs {
    /// Entity type (repeatable)
    #[arg(long = "entity-type")]
    entity_types: Vec<String>,
    /// Facility type (repeatable)
    #[arg(long = "facility-type")]
    facility_types: Vec<String>,
    /// City (repeatable)
    #[arg(long = "city")]
    cities: Vec<String>,
    /// License type (repeatable)
    #[arg(long = "license-type")]
    license_types: Vec<String>,
    /// County (repeatable)
    #[arg(long = "county")]
    counties: Vec<String>,
    /// Specialty; every given specialty must be listed (repeatable)
    #[arg(long = "specialty")]
    specialties: Vec<String>,
    /// Condition; every given condition must be listed (repeatable)
    #[arg(long = "condition")]
    conditions: Vec<String>,
    /// Accreditation; every given accreditation must be held (repeatable)
    #[arg(long = "accreditation")]
    accreditations: Vec<String>,
    /// Purchasing styles to include
    #[arg(
        long = "purchasing-style",
        value_enum,
        num_args = 0..,
        default_values_t = [StyleOpt::PatientSpecific, StyleOpt::Bulk]
    )]
    purchasing_styles: Vec<StyleOpt>,
    /// Use the available pharmacies file instead of the full license list
    #[arg(long)]
    available: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    data: DataArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// Limit number of results
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    data: DataArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
    /// Export format (defaults to the file extension, then the configured format)
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ExportFormatOpt {
    Json,
    Jsonl,
    Csv,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Json => ExportFormat::Json,
            ExportFormatOpt::Jsonl => ExportFormat::JsonLines,
            ExportFormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StyleOpt {
    /// 503A patient-specific compounding
    PatientSpecific,
    /// 503B bulk outsourcing
    Bulk,
}

impl From<StyleOpt> for PurchasingStyle {
    fn from(opt: StyleOpt) -> Self {
        match opt {
            StyleOpt::PatientSpecific => PurchasingStyle::PatientSpecific,
            StyleOpt::Bulk => PurchasingStyle::Bulk,
        }
    }
}

impl FilterArgs {
    /// Build the selection, refusing an empty purchasing style choice
    fn selections(&self) -> anyhow::Result<FacetSelections> {
        if self.purchasing_styles.is_empty() {
            bail!("Please select at least one purchasing style (patient-specific or bulk)");
        }

        Ok(FacetSelections::new()
            .select(CategoricalField::EntityType.column_name(), &self.entity_types)
            .select(CategoricalField::FacilityType.column_name(), &self.facility_types)
            .select(CategoricalField::City.column_name(), &self.cities)
            .select(CategoricalField::LicenseType.column_name(), &self.license_types)
            .select(CategoricalField::County.column_name(), &self.counties)
            .select(TagField::Specialties.column_name(), &self.specialties)
            .select(TagField::Conditions.column_name(), &self.conditions)
            .select(TagField::Accreditations.column_name(), &self.accreditations)
            .purchasing_styles(self.purchasing_styles.iter().copied().map(PurchasingStyle::from)))
    }

    fn apply<'a>(&self, dataset: &'a PharmacyDataset) -> anyhow::Result<Vec<&'a PharmacyRecord>> {
        let selections = self.selections()?;
        let rows = if self.available {
            dataset.filter_available(&selections)?
        } else {
            dataset.filter(&selections)?
        };
        Ok(rows)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let explorer_config = match cli.config.as_deref() {
        Some(path) => ExplorerConfig::load_layered(Some(path))?,
        None => ExplorerConfig::load(),
    };
    configure_thread_pool(&explorer_config);
    config::set_global_config(explorer_config);

    match cli.command {
        Commands::Stats(args) => cmd_stats(args),
        Commands::Vocab(args) => cmd_vocab(args),
        Commands::Counts(args) => cmd_counts(args),
        Commands::Search(args) => cmd_search(args),
        Commands::Export(args) => cmd_export(args),
    }
}

#[cfg(feature = "parallel")]
fn configure_thread_pool(config: &ExplorerConfig) {
    if let Some(threads) = config.parallel_threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            log::warn!("Could not configure {} filter threads: {}", threads, e);
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn configure_thread_pool(_config: &ExplorerConfig) {}

fn load_dataset(args: &DataArgs) -> anyhow::Result<PharmacyDataset> {
    let config = config::global_config();
    let dir = args.data_dir.clone()
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from("data"));
    debug!("Loading dataset from {}", dir.display());

    PharmacyDatasetBuilder::from_config(&config)
        .discover(&dir)
        .and_then(|builder| builder.build())
        .map_err(|e| anyhow!(e.user_message()))
        .with_context(|| format!("Error loading dataset from {}", dir.display()))
}

fn cmd_stats(args: DataArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args)?;
    dataset.statistics().print_summary();
    if let Some(available) = dataset.available() {
        println!("Available pharmacies: {}", available.len());
    }
    Ok(())
}

fn cmd_vocab(args: VocabArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args.data)?;
    match Facet::parse(&args.column)? {
        Facet::Tag(field) => {
            for term in dataset.vocabulary(field) {
                println!("{}", term);
            }
        }
        Facet::Categorical(field) => {
            for value in dataset.options(field) {
                println!("{}", value);
            }
        }
        Facet::PurchasingStyle => {
            for style in PurchasingStyle::ALL {
                println!("{} ({})", style.label(), style.category());
            }
        }
    }
    Ok(())
}

fn cmd_counts(args: CountsArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args.data)?;
    let rows = args.filters.apply(&dataset)?;
    let analytics = PharmacyAnalytics::new(rows.iter().copied()).with_extractor(dataset.extractor().clone());

    let facet = Facet::parse(&args.column)?;
    let table: CountTable = match facet {
        Facet::Tag(field) => analytics.tag_counts(field),
        Facet::Categorical(field) => analytics.value_counts(field),
        Facet::PurchasingStyle => analytics
            .purchasing_style_counts()
            .into_iter()
            .map(|(style, count)| (style.label().to_string(), count))
            .collect(),
    };

    let format = resolve_format(args.format, args.output.as_deref());
    match args.output {
        Some(path) => {
            export_counts(&table, facet.column_name(), &path, format)?;
            println!("Exported {} values to {}", table.len(), path.display());
        }
        None => write_counts(&table, facet.column_name(), ExportFormat::Csv, std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_search(args: SearchArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args.data)?;
    let results = args.filters.apply(&dataset)?;
    write_search_results(&results, args.limit, std::io::stdout().lock())?;
    Ok(())
}

/// Result table, or the empty-result notice
fn write_search_results<W: Write>(results: &[&PharmacyRecord], limit: usize, mut out: W) -> std::io::Result<()> {
    if results.is_empty() {
        writeln!(out, "{}", NO_MATCHES)?;
        return Ok(());
    }

    for pharmacy in results.iter().take(limit) {
        writeln!(
            out,
            "{} | {} | {} | {}",
            pharmacy.pharmacy_name,
            pharmacy.license_type.as_deref().unwrap_or("-"),
            pharmacy.display_location(),
            pharmacy.purchasing_style(),
        )?;
    }
    writeln!(out, "Total matches: {}", results.len())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args.data)?;
    let results = args.filters.apply(&dataset)?;
    let format = resolve_format(args.format, Some(&args.output));

    export_records(&results, &args.output, format)
        .with_context(|| format!("Export error writing {}", args.output.display()))?;
    println!("Exported {} pharmacies to {}", results.len(), args.output.display());
    Ok(())
}

/// Explicit flag, then file extension, then the configured default
fn resolve_format(opt: Option<ExportFormatOpt>, output: Option<&Path>) -> ExportFormat {
    opt.map(ExportFormat::from)
        .or_else(|| output.and_then(ExportFormat::from_path))
        .unwrap_or_else(|| config::global_config().default_export_format)
}
