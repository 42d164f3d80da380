//! mindshare - run the stance and mindshare pipeline over a content dump.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mindshare_common::config::expand_path;
use mindshare_common::logging::init_logging_with_exclusions;
use mindshare_common::Config;
use mindshare_engine::demo::{DemoConfig, DemoGenerator};
use mindshare_engine::ingest::load_records;
use mindshare_engine::report::{write_json, PipelineReport};
use mindshare_engine::{Catalog, Pipeline};

/// Stance and mindshare tracking over public content.
#[derive(Parser, Debug)]
#[command(name = "mindshare")]
#[command(version)]
#[command(about = "Stance time series, mindshare and flip detection for tracked voices", long_about = None)]
struct Cli {
    /// Config file (default: ~/.mindshare/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline over a catalog and a content file
    Run {
        /// Catalog JSON with voices and topics
        #[arg(long)]
        catalog: String,

        /// Content items as a JSON array or JSONL
        #[arg(long)]
        items: String,

        /// Report path (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Generate a seeded demo dataset and run the pipeline over it
    Demo {
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of voices
        #[arg(long, default_value = "6")]
        voices: usize,

        /// Number of bins
        #[arg(long, default_value = "12")]
        bins: usize,

        /// Report path (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Also write the generated catalog.json and items.json into this directory
        #[arg(long)]
        dump_inputs: Option<String>,
    },
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else {
        return Config::load_and_validate();
    };
    let mut config = Config::load_from(&expand_path(path))?;
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn emit(report: &PipelineReport, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            let path = expand_path(path);
            write_json(&path, report)?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => println!("{}", report.to_json_string()?),
    }
    Ok(())
}

fn run(config: &Config, catalog: &Path, items: &Path, output: Option<&str>) -> Result<()> {
    let catalog = Catalog::load(catalog)?;
    let records = load_records(items)?;
    tracing::info!(
        voices = catalog.voices().len(),
        topics = catalog.topics().len(),
        records = records.len(),
        "Inputs loaded"
    );

    let pipeline = Pipeline::new(catalog, &config.pipeline)?;
    let output_data = pipeline.run_raw(records);
    emit(&PipelineReport::new(output_data, &config.pipeline), output)
}

fn demo(config: &Config, demo: DemoConfig, output: Option<&str>, dump: Option<PathBuf>) -> Result<()> {
    let dataset = DemoGenerator::new(demo)?.generate()?;

    if let Some(dir) = dump {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let catalog_json = serde_json::to_string_pretty(&dataset.catalog.to_file())?;
        std::fs::write(dir.join("catalog.json"), catalog_json)
            .with_context(|| format!("Failed to write catalog into {}", dir.display()))?;
        let items_json = serde_json::to_string_pretty(&dataset.items)?;
        std::fs::write(dir.join("items.json"), items_json)
            .with_context(|| format!("Failed to write items into {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "Demo inputs written");
    }

    let pipeline = Pipeline::new(dataset.catalog, &config.pipeline)?;
    let output_data = pipeline.run(dataset.items);
    emit(&PipelineReport::new(output_data, &config.pipeline), output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::debug!("mindshare v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            catalog,
            items,
            output,
        } => run(
            &config,
            &expand_path(&catalog),
            &expand_path(&items),
            output.as_deref(),
        ),
        Commands::Demo {
            seed,
            voices,
            bins,
            output,
            dump_inputs,
        } => {
            let bin_width_secs = i64::try_from(config.pipeline.bin_width_secs()?)
                .context("pipeline.bin_width is too large")?;
            let demo_config = DemoConfig {
                seed,
                voices,
                bins,
                bin_width_secs,
                flip_bin: bins / 2,
                ..DemoConfig::default()
            };
            demo(
                &config,
                demo_config,
                output.as_deref(),
                dump_inputs.map(|d| expand_path(&d)),
            )
        }
    }
}
