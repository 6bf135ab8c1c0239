//! Hypno CLI - Command-line interface for Synheart Sleep
//!
//! Commands:
//! - analyze: Compute AASM sleep parameters for a hypnogram
//! - validate: Check every stage label of a hypnogram
//! - schema: Print the report schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_sleep::hypnogram::{Hypnogram, InputFormat};
use synheart_sleep::pipeline::SleepProcessor;
use synheart_sleep::report::{SleepReport, REPORT_VERSION};
use synheart_sleep::types::StageValues;
use synheart_sleep::{AnalysisConfig, SLEEP_VERSION};

/// Hypno - AASM sleep parameters from scored hypnograms
#[derive(Parser)]
#[command(name = "hypno")]
#[command(author = "Synheart AI Inc")]
#[command(version = SLEEP_VERSION)]
#[command(about = "Compute AASM sleep parameters from hypnograms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute sleep parameters for a hypnogram
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format (inferred from the file extension when omitted)
        #[arg(long)]
        input_format: Option<Format>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Epoch length in seconds, overrides the config file and the hypnogram
        #[arg(long)]
        epoch_length: Option<f64>,

        /// Load analysis settings from a JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source name recorded in the report (defaults to the input path)
        #[arg(long)]
        source: Option<String>,
    },

    /// Validate the stage labels of a hypnogram
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format (inferred from the file extension when omitted)
        #[arg(long)]
        input_format: Option<Format>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the report JSON schema
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Whitespace or comma separated labels
    Labels,
    /// CSV with an AASM column
    Csv,
    /// JSON array of labels or { "stages": [...] } document
    Json,
}

impl From<Format> for InputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Labels => InputFormat::Labels,
            Format::Csv => InputFormat::Csv,
            Format::Json => InputFormat::Json,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Human-readable summary
    Text,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HypnoCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            epoch_length,
            config,
            source,
        } => cmd_analyze(
            &input,
            &output,
            resolve_format(&input, input_format),
            output_format,
            epoch_length,
            config.as_deref(),
            source,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, resolve_format(&input, input_format), json),

        Commands::Schema => {
            println!("{}", get_report_json_schema());
            Ok(())
        }
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    epoch_length: Option<f64>,
    config: Option<&Path>,
    source: Option<String>,
) -> Result<(), HypnoCliError> {
    let input_data = read_input(input)?;

    let processor = match (epoch_length, config) {
        (Some(epoch_length), _) => {
            SleepProcessor::with_config(AnalysisConfig::with_epoch_length(epoch_length)?)?
        }
        (None, Some(config_path)) => {
            let config_json = fs::read_to_string(config_path)?;
            SleepProcessor::with_config(AnalysisConfig::from_json(&config_json)?)?
        }
        (None, None) => SleepProcessor::new(),
    };

    let source = source.unwrap_or_else(|| default_source(input));
    let hypnogram = Hypnogram::parse(&input_data, input_format)?;

    if hypnogram.is_empty() {
        return Err(HypnoCliError::NoEpochs);
    }

    let report = processor.process_hypnogram(&hypnogram, &source)?;

    for flag in &report.quality.flags {
        log::warn!("{source}: {flag:?}");
    }

    let output_data = format_output(&report, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
        log::info!("report written to {}", output.display());
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), HypnoCliError> {
    let input_data = read_input(input)?;
    let (total, invalid) = Hypnogram::validate_labels(&input_data, input_format)?;

    let report = ValidationReport {
        total_epochs: total,
        valid_epochs: total - invalid.len(),
        invalid_epochs: invalid.len(),
        errors: invalid
            .into_iter()
            .map(|i| ValidationErrorDetail {
                epoch: i.epoch,
                label: i.label,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total epochs:   {}", report.total_epochs);
        println!("Valid epochs:   {}", report.valid_epochs);
        println!("Invalid epochs: {}", report.invalid_epochs);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Epoch {}: unknown stage '{}'", err.epoch, err.label);
            }
        }
    }

    if report.invalid_epochs > 0 {
        Err(HypnoCliError::ValidationFailed(report.invalid_epochs))
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, HypnoCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            log::info!("reading hypnogram from stdin, end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn resolve_format(input: &Path, format: Option<Format>) -> InputFormat {
    if let Some(format) = format {
        return format.into();
    }

    match input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => InputFormat::Csv,
        Some("json") => InputFormat::Json,
        _ => InputFormat::Labels,
    }
}

fn default_source(input: &Path) -> String {
    if input.to_string_lossy() == "-" {
        "stdin".to_string()
    } else {
        input.display().to_string()
    }
}

fn format_output(report: &SleepReport, format: &OutputFormat) -> Result<String, HypnoCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(report)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_text(report: &SleepReport) -> String {
    let value = |v: Option<f64>| match v {
        Some(v) => format!("{v:.1}"),
        None => "n/a".to_string(),
    };
    let stages = |values: &StageValues<Option<f64>>| {
        values
            .iter()
            .map(|(stage, v)| format!("{stage}={}", value(*v)))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let row = |label: &str, text: String| format!("{label:<30}{text}");

    let p = &report.parameters;
    let s = &report.stages;
    let lights = match report.lights {
        Some(lights) => format!("{} / {}", lights.off, lights.on),
        None => "n/a".to_string(),
    };

    let mut lines = vec![
        format!("Sleep Report ({})", report.provenance.source),
        "============".to_string(),
        row(
            "Epochs:",
            format!("{} x {} s", report.epoch_count, report.epoch_length_sec),
        ),
        row("Lights off / on (epoch):", lights),
        row("Total recording time (min):", value(p.total_recording_time)),
        row("Total sleep time (min):", value(p.total_sleep_time)),
        row("Sleep period time (min):", value(p.sleep_period_time)),
        row("Sleep onset latency (min):", value(p.sleep_onset_latency)),
        row("Wake after sleep onset (min):", value(p.wake_after_sleep_onset)),
        row("Sleep efficiency (%):", value(p.sleep_efficiency)),
        String::new(),
        row("Stage minutes:", stages(&s.minutes.map(|v| Some(*v)))),
        row("Stage share (%):", stages(&s.relative_time)),
        row("Stage onset latency (min):", stages(&s.onset_latency)),
    ];

    if !report.quality.flags.is_empty() {
        let flags: Vec<String> = report
            .quality
            .flags
            .iter()
            .map(|f| format!("{f:?}"))
            .collect();
        lines.push(String::new());
        lines.push(format!("Flags: {}", flags.join(", ")));
    }

    lines.join("\n") + "\n"
}

fn get_report_json_schema() -> String {
    let nullable_number = serde_json::json!({ "type": ["number", "null"] });
    let stage_object = |item: serde_json::Value| {
        serde_json::json!({
            "type": "object",
            "required": ["R", "N1", "N2", "N3"],
            "properties": { "R": item, "N1": item, "N2": item, "N3": item }
        })
    };

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/sleep.report.v1.json",
        "title": format!("sleep.report {}", REPORT_VERSION),
        "description": "Synheart AASM sleep parameter report",
        "type": "object",
        "required": [
            "report_version", "producer", "provenance", "quality", "epoch_length_sec",
            "epoch_count", "lights", "sleep_epochs", "parameters", "stages"
        ],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "provenance": {
                "type": "object",
                "properties": {
                    "source": { "type": "string" },
                    "computed_at_utc": { "type": "string", "format": "date-time" }
                }
            },
            "quality": {
                "type": "object",
                "properties": {
                    "flags": {
                        "type": "array",
                        "items": {
                            "enum": ["no_recorded_epochs", "no_sleep_epochs", "contains_artefacts"]
                        }
                    }
                }
            },
            "epoch_length_sec": { "type": "number" },
            "epoch_count": { "type": "integer" },
            "lights": {
                "type": ["object", "null"],
                "properties": {
                    "off": { "type": "integer" },
                    "on": { "type": "integer" }
                }
            },
            "sleep_epochs": {
                "type": ["object", "null"],
                "properties": {
                    "onset": { "type": "integer" },
                    "final_awakening": { "type": "integer" },
                    "total_sleep_epochs": { "type": "integer" }
                }
            },
            "parameters": {
                "type": "object",
                "properties": {
                    "total_recording_time": nullable_number,
                    "sleep_onset_latency": nullable_number,
                    "sleep_period_time": nullable_number,
                    "total_sleep_time": nullable_number,
                    "wake_after_sleep_onset": nullable_number,
                    "sleep_efficiency": nullable_number
                }
            },
            "stages": {
                "type": "object",
                "properties": {
                    "epochs": stage_object(serde_json::json!({ "type": "integer" })),
                    "minutes": stage_object(serde_json::json!({ "type": "number" })),
                    "onset_latency": stage_object(nullable_number.clone()),
                    "relative_time": stage_object(nullable_number.clone())
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum HypnoCliError {
    Io(io::Error),
    Compute(synheart_sleep::ComputeError),
    Json(serde_json::Error),
    NoEpochs,
    ValidationFailed(usize),
}

impl From<io::Error> for HypnoCliError {
    fn from(e: io::Error) -> Self {
        HypnoCliError::Io(e)
    }
}

impl From<synheart_sleep::ComputeError> for HypnoCliError {
    fn from(e: synheart_sleep::ComputeError) -> Self {
        HypnoCliError::Compute(e)
    }
}

impl From<serde_json::Error> for HypnoCliError {
    fn from(e: serde_json::Error) -> Self {
        HypnoCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HypnoCliError> for CliError {
    fn from(e: HypnoCliError) -> Self {
        match e {
            HypnoCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HypnoCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'hypno validate' to check the hypnogram".to_string()),
            },
            HypnoCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HypnoCliError::NoEpochs => CliError {
                code: "NO_EPOCHS".to_string(),
                message: "No epochs found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            HypnoCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} epochs have unknown stage labels", count),
                hint: Some("Allowed labels: W, N1, N2, N3, R, L, A".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_epochs: usize,
    valid_epochs: usize,
    invalid_epochs: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    epoch: usize,
    label: String,
}
