use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process::ExitCode;
use time::macros::format_description;

use forestry_etl::config::{EtlConfig, DEFAULT_DATA_DIR, DEFAULT_OUTPUT_DIR};
use forestry_etl::runner::{print_final_summary, run_batch};
use forestry_etl::units::{registry, select, TransformUnit};

#[derive(Parser)]
#[command(name = "Forestry Observatory ETL")]
#[command(about = "Builds the observatory dashboard JSON documents from the raw CSV/XLSX sources")]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_DATA_DIR, help = "Directory containing the source CSV/XLSX files")]
    data_dir: PathBuf,

    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR, help = "Root directory for the topic output folders")]
    output_dir: PathBuf,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,

    #[arg(short, long = "unit", help = "Run only this unit (repeatable)")]
    units: Vec<String>,

    #[arg(long, help = "Freeze metadata.lastUpdated to this date (YYYY-MM-DD)")]
    as_of: Option<String>,

    #[arg(long, help = "Fail units whose optional inputs are missing")]
    strict: bool,

    #[arg(long, help = "List the registered units and exit")]
    list: bool,
}

fn setup_logging(log_level_str: &str) -> Result<()> {
    let log_level = match log_level_str.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", other);
            LevelFilter::Info
        }
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    Ok(())
}

fn print_registry(units: &[Box<dyn TransformUnit>], config: &EtlConfig) {
    for unit in units {
        let inputs: Vec<String> = unit
            .inputs()
            .iter()
            .map(|spec| {
                let kind = if spec.required { "required" } else { "optional" };
                format!("{} ({})", spec.candidates.join(" | "), kind)
            })
            .collect();
        println!(
            "{:<14} {:<18} {} -> {}",
            unit.name(),
            unit.topic().dir_name(),
            inputs.join(", "),
            config.output_path(unit.topic(), unit.output_file()).display()
        );
    }
}

fn build_config(cli: &Cli) -> Result<EtlConfig> {
    let config = EtlConfig::new(&cli.data_dir, &cli.output_dir).with_strict(cli.strict);
    match &cli.as_of {
        Some(date) => config.with_as_of(date),
        None => Ok(config),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config = build_config(&cli)?;
    let units = select(registry(), &cli.units)?;

    if cli.list {
        print_registry(&units, &config);
        return Ok(ExitCode::SUCCESS);
    }

    info!("Starting forestry observatory ETL");
    info!("Reading sources from: {}", config.data_dir.display());
    info!("Writing documents under: {}", config.output_dir.display());

    let report = run_batch(&units, &config);
    print_final_summary(&report);

    Ok(ExitCode::from(report.exit_code() as u8))
}
