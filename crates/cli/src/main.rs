//! geolink CLI
//!
//! Resolves free-text neighborhood names, links incident and demographic
//! records to neighborhood polygons and derives per-polygon indices

mod config;
mod progress;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use geolink_core::{LinkageInputs, LinkageOutput, LinkagePipeline};
use geolink_formats::atomic::{OutputBatch, NAME_VARIANTS_CSV};
use geolink_formats::{
    distinct_names, load_demographics, load_incidents, load_mapping, load_polygons, open_table,
    read_table, write_mapping, write_run_outputs, write_variant_report_csv,
};
use geolink_names::{GroupingConfig, Lexicon, NameGrouper, SimilarityMetric};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::RunConfig;
use progress::ProgressObserver;

#[derive(Parser)]
#[command(name = "geolink")]
#[command(
    version,
    about = "Neighborhood name resolution and spatial record linkage",
    long_about = None
)]
#[command(author = "geolink")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output statistics in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Group raw neighborhood names into canonical names
    GroupNames {
        /// Input table (CSV or JSONL, optionally gzipped)
        #[arg(short, long)]
        input: PathBuf,

        /// Column holding the raw names
        #[arg(short, long)]
        column: String,

        /// Mapping file to write (original,canonical)
        #[arg(short, long)]
        output: PathBuf,

        /// Similarity threshold (0.0-1.0)
        #[arg(short, long, default_value = "0.9")]
        threshold: f64,

        /// Similarity metric
        #[arg(short, long, value_enum, default_value_t = MetricArg::Gestalt)]
        metric: MetricArg,

        /// Drop settlement-type prefixes (COLONIA, FRACC., ...) before comparing
        #[arg(long)]
        strip_prefixes: bool,

        /// Lexicon file replacing the bundled word lists
        #[arg(long)]
        lexicon: Option<PathBuf>,
    },

    /// Link incidents and demographics to polygons and compute indices
    Link {
        /// Run config file (YAML or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the similarity threshold
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Override the buffer distance in meters (0 disables buffered matching)
        #[arg(short, long)]
        buffer: Option<f64>,

        /// Show statistics without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect a table file
    Inspect {
        /// Path to the table
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Number of records to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    Gestalt,
    Levenshtein,
    JaroWinkler,
}

impl From<MetricArg> for SimilarityMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Gestalt => SimilarityMetric::Gestalt,
            MetricArg::Levenshtein => SimilarityMetric::Levenshtein,
            MetricArg::JaroWinkler => SimilarityMetric::JaroWinkler,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(!cli.json) // Disable colors if JSON output
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::GroupNames {
            input,
            column,
            output,
            threshold,
            metric,
            strip_prefixes,
            lexicon,
        } => {
            let config = GroupingConfig {
                threshold,
                metric: metric.into(),
                strip_prefixes,
                ..Default::default()
            };
            group_names(&input, &column, &output, config, lexicon.as_deref(), cli.json)?;
        }
        Commands::Link {
            config,
            threshold,
            buffer,
            dry_run,
        } => {
            link(&config, threshold, buffer, dry_run, cli.json)?;
        }
        Commands::Inspect { input, limit } => {
            inspect_table(&input, limit)?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

/// Companion variant-report path next to a mapping file
///
/// Examples:
///   names.csv     → names.variants.csv
///   mapping       → mapping.variants.csv
fn variants_path(output: &Path) -> PathBuf {
    let stem = output.file_stem().unwrap_or_default().to_string_lossy();
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.variants.csv", stem))
}

fn group_names(
    input: &Path,
    column: &str,
    output: &Path,
    config: GroupingConfig,
    lexicon: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    info!("Grouping names");
    info!("  Input: {:?}", input);
    info!("  Column: {}", column);
    info!("  Threshold: {} ({})", config.threshold, config.metric);

    let lexicon = match lexicon {
        Some(path) => Lexicon::from_path(path)
            .with_context(|| format!("Failed to load lexicon: {}", path.display()))?,
        None => Lexicon::embedded()?,
    };
    let grouper = NameGrouper::with_lexicon(config, lexicon)?;

    let records =
        read_table(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let names = distinct_names(&records, column)?;
    let occurrences: u64 = names.iter().map(|n| n.frequency).sum();
    let grouping = grouper.group(&names);
    let report = geolink_core::diagnostics::variant_report(&grouping);

    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("Not a file path: {}", output.display()))?;
    let variants = variants_path(output);
    let variants_name = variants
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| NAME_VARIANTS_CSV.to_string());

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut batch = OutputBatch::new(parent)?;
    batch.stage(&file_name, |w| write_mapping(w, &grouping.mapping))?;
    batch.stage(&variants_name, |w| write_variant_report_csv(w, &report))?;
    batch.commit()?;

    let stats = &grouping.stats;
    if json_output {
        let summary = serde_json::json!({
            "input": input.to_string_lossy().to_string(),
            "mapping": output.to_string_lossy().to_string(),
            "variants": variants.to_string_lossy().to_string(),
            "named_records": occurrences,
            "stats": stats,
            "reduction_rate": stats.reduction_rate(),
            "variant_groups": report,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n{}", "═".repeat(60));
        println!("Name Grouping Complete");
        println!("{}", "═".repeat(60));
        println!("Input:              {}", input.display());
        println!("Mapping:            {}", output.display());
        println!("Variant report:     {}", variants.display());
        println!("Named records:      {}", progress::format_with_commas(occurrences as usize));
        println!("Distinct names:     {}", progress::format_with_commas(stats.distinct_names));
        println!(
            "Canonical names:    {} ({:.1}% reduction)",
            progress::format_with_commas(stats.groups),
            stats.reduction_rate()
        );
        println!(
            "Multi-variant:      {}",
            progress::format_with_commas(stats.multi_variant_groups)
        );
        for group in report.iter().take(10) {
            println!(
                "  {} ← {} variants, {} records",
                group.canonical, group.variant_count, group.total_frequency
            );
        }
        println!("{}", "═".repeat(60));
    }

    Ok(())
}

fn load_inputs(config: &RunConfig) -> Result<LinkageInputs> {
    let inputs = &config.inputs;
    let polygons = load_polygons(&inputs.polygons, &config.columns.polygons)
        .with_context(|| format!("Failed to load polygons: {}", inputs.polygons.display()))?;
    let incidents = load_incidents(&inputs.incidents, &config.columns.incidents)
        .with_context(|| format!("Failed to load incidents: {}", inputs.incidents.display()))?;
    let demographics = match &inputs.demographics {
        Some(path) => load_demographics(path, &config.columns.demographics)
            .with_context(|| format!("Failed to load demographics: {}", path.display()))?,
        None => Vec::new(),
    };
    let mapping = match &inputs.mapping {
        Some(path) => Some(
            load_mapping(path)
                .with_context(|| format!("Failed to load mapping: {}", path.display()))?,
        ),
        None => None,
    };
    Ok(LinkageInputs {
        polygons,
        incidents,
        demographics,
        mapping,
    })
}

fn link(
    config_path: &Path,
    threshold: Option<f64>,
    buffer: Option<f64>,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let mut config = RunConfig::load(config_path)?;
    if let Some(threshold) = threshold {
        config.grouping.config.threshold = threshold;
    }
    if let Some(buffer) = buffer {
        config.spatial.buffer_meters = buffer;
    }

    info!("Running linkage");
    info!("  Config: {:?}", config_path);
    info!("  Polygons: {:?}", config.inputs.polygons);
    info!("  Incidents: {:?}", config.inputs.incidents);
    if let Some(path) = &config.inputs.demographics {
        info!("  Demographics: {:?}", path);
    }
    info!("  Threshold: {}", config.grouping.config.threshold);
    info!("  Buffer: {} m", config.spatial.buffer_meters);
    if !dry_run {
        info!("  Output: {:?}", config.outputs.directory);
    }

    let pipeline = LinkagePipeline::new(config.pipeline_config()?)?;
    let inputs = load_inputs(&config)?;

    let mut observer = if json_output {
        ProgressObserver::hidden()
    } else {
        ProgressObserver::new()
    };
    let output = pipeline.run_with_observer(inputs, &mut observer)?;
    observer.finish();

    if output.diagnostics.has_issues() {
        warn!(
            "{} incidents unresolved, {} corrected; see diagnostics",
            output.stats.unresolved, output.stats.corrected
        );
    }

    let written = if dry_run {
        Vec::new()
    } else {
        write_run_outputs(&config.outputs.directory, &output, config.outputs.parquet).with_context(
            || format!("Failed to write outputs to {}", config.outputs.directory.display()),
        )?
    };

    let directory = (!dry_run).then_some(config.outputs.directory.as_path());
    if json_output {
        print_json_report(&output, directory, &written)?;
    } else {
        progress::print_summary_report(&output, directory, &written);
    }

    Ok(())
}

fn print_json_report(
    output: &LinkageOutput,
    directory: Option<&Path>,
    written: &[PathBuf],
) -> Result<()> {
    let report = serde_json::json!({
        "output": directory.map(|d| d.to_string_lossy().to_string()),
        "files": written.iter().map(|p| p.to_string_lossy().to_string()).collect::<Vec<_>>(),
        "stats": output.stats,
        "linkage_rate": output.stats.linkage_rate(),
        "correction_rate": output.stats.correction_rate(),
        "index_coverage": output.stats.index_coverage(),
        "cascade": output.diagnostics.incident_cascade,
        "multi_variant_groups": output.diagnostics.multi_variant_groups,
        "dry_run": directory.is_none(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn inspect_table(input: &Path, limit: usize) -> Result<()> {
    info!("Inspecting table: {:?}", input);

    let mut reader = open_table(input)?;
    if let Some(columns) = reader.columns() {
        println!("Columns: {}", columns.join(", "));
    }

    let mut count = 0;
    while count < limit {
        let Some(result) = reader.next() else { break };
        let record = result?;
        println!(
            "Record #{}: {}",
            record.source_line,
            serde_json::to_string_pretty(&record.data)?
        );
        count += 1;
    }

    info!("Processed {} records", reader.records_processed());

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
}
