//! Glucose Flux CLI - Command-line interface for Glucose Flux
//!
//! Commands:
//! - analyze: Score raw records into daily reports (batch mode)
//! - run: Score streaming NDJSON from stdin, one day at a time
//! - validate: Validate raw record schema
//! - doctor: Diagnose configuration and ledger state
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use glucose_flux::schema::{RawEvent, RawEventAdapter, ValidationError, SCHEMA_VERSION};
use glucose_flux::types::{local_date, ReportPayload, UnitSystem};
use glucose_flux::{
    AnalyticsConfig, ComputeError, GlucoseInput, GlucoseProcessor, ScoreLedger, ENGINE_VERSION,
    PRODUCER_NAME,
};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Glucose Flux - On-device glucose-response analytics
#[derive(Parser)]
#[command(name = "glucose-flux")]
#[command(author = "Synheart AI Inc")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score glucose readings, meals and insulin into daily reports", long_about = None)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the analyzing commands
#[derive(clap::Args)]
struct AnalysisArgs {
    /// Analytics configuration file (JSON); missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Offset of the local day from UTC, in minutes (overrides the config file)
    #[arg(long, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    /// Unit of the readings; skips detection
    #[arg(long)]
    unit: Option<UnitArg>,

    /// Subject ID for provenance when records carry none
    #[arg(long, default_value = "unknown")]
    subject_id: String,

    /// Load the score ledger from file
    #[arg(long)]
    load_ledger: Option<PathBuf>,

    /// Save the score ledger to file after processing
    #[arg(long)]
    save_ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score raw records into daily reports (batch mode)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Score streaming NDJSON from stdin, emitting each day once the next begins
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Flush output after each day
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate raw record schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and ledger state
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a ledger file
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    /// mmol/L
    Mmol,
    /// mg/dL
    Mgdl,
}

impl From<UnitArg> for UnitSystem {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Mmol => UnitSystem::Mmol,
            UnitArg::Mgdl => UnitSystem::Mgdl,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (glucose.raw_event.v1)
    Input,
    /// Output schema (daily report)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

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

fn init_tracing(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    // stdout carries reports, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), GlucoseCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            analysis,
        } => cmd_analyze(&input, &output, input_format, output_format, &analysis),

        Commands::Run {
            output_format,
            analysis,
            flush,
        } => cmd_run(output_format, &analysis, flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            ledger,
            json,
        } => cmd_doctor(config.as_deref(), ledger.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn read_input(input: &Path) -> Result<String, GlucoseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_records(data: &str, format: &InputFormat) -> Result<Vec<RawEvent>, GlucoseCliError> {
    Ok(match format {
        InputFormat::Ndjson => RawEventAdapter::parse_ndjson(data)?,
        InputFormat::Json => RawEventAdapter::parse_array(data)?,
    })
}

fn load_config(args: &AnalysisArgs) -> Result<AnalyticsConfig, GlucoseCliError> {
    let mut config = match &args.config {
        Some(path) => AnalyticsConfig::from_json(&fs::read_to_string(path)?)?,
        None => AnalyticsConfig::default(),
    };
    if let Some(minutes) = args.utc_offset_minutes {
        config.utc_offset_minutes = minutes;
    }
    Ok(config)
}

fn build_processor(args: &AnalysisArgs) -> Result<GlucoseProcessor, GlucoseCliError> {
    let config = load_config(args)?;
    debug!(utc_offset_minutes = config.utc_offset_minutes, "Loaded configuration");

    let mut processor = GlucoseProcessor::with_config(config)?;
    if let Some(path) = &args.load_ledger {
        processor.load_ledger(&fs::read_to_string(path)?)?;
        info!(days = processor.ledger().days(), path = %path.display(), "Loaded score ledger");
    }
    Ok(processor)
}

fn save_ledger(processor: &GlucoseProcessor, args: &AnalysisArgs) -> Result<(), GlucoseCliError> {
    if let Some(path) = &args.save_ledger {
        fs::write(path, processor.save_ledger()?)?;
        info!(days = processor.ledger().days(), path = %path.display(), "Saved score ledger");
    }
    Ok(())
}

/// Analyze one batch of records and return encoded payloads
fn analyze_records(
    processor: &mut GlucoseProcessor,
    records: &[RawEvent],
    unit: Option<UnitSystem>,
    subject_id: &str,
) -> Result<(Vec<ReportPayload>, Option<UnitSystem>), GlucoseCliError> {
    let mut input: GlucoseInput = RawEventAdapter::to_input(records)?;
    if unit.is_some() {
        input.unit = unit;
    }

    let reports = processor.analyze(&input, Utc::now())?;
    let settled_unit = reports.first().map(|r| r.unit);
    let subject = input.subject_id.as_deref().unwrap_or(subject_id);

    Ok((processor.payloads(&reports, subject), settled_unit))
}

/// Records of the local day currently being streamed
struct DayBuffer {
    offset: FixedOffset,
    current: Option<NaiveDate>,
    analyzed: Option<NaiveDate>,
    records: Vec<RawEvent>,
}

enum Push {
    Buffered,
    /// The record falls on a day that was already analyzed
    Late(DateTime<Utc>),
    /// A later day started; holds the finished day's records
    DayComplete(Vec<RawEvent>),
}

impl DayBuffer {
    fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            current: None,
            analyzed: None,
            records: Vec::new(),
        }
    }

    fn push(&mut self, record: RawEvent) -> Push {
        let date = local_date(record.timestamp, self.offset);

        if matches!(self.analyzed, Some(analyzed) if date <= analyzed) {
            return Push::Late(record.timestamp);
        }

        match self.current {
            Some(current) if date > current => {
                self.analyzed = Some(current);
                self.current = Some(date);
                Push::DayComplete(std::mem::replace(&mut self.records, vec![record]))
            }
            Some(_) => {
                self.records.push(record);
                Push::Buffered
            }
            None => {
                self.current = Some(date);
                self.records.push(record);
                Push::Buffered
            }
        }
    }

    fn finish(self) -> Vec<RawEvent> {
        self.records
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    args: &AnalysisArgs,
) -> Result<(), GlucoseCliError> {
    let records = parse_records(&read_input(input)?, &input_format)?;
    if records.is_empty() {
        return Err(GlucoseCliError::NoRecords);
    }

    let mut processor = build_processor(args)?;
    let (payloads, _) = analyze_records(
        &mut processor,
        &records,
        args.unit.map(UnitSystem::from),
        &args.subject_id,
    )?;

    if payloads.is_empty() {
        return Err(GlucoseCliError::NoReports);
    }

    save_ledger(&processor, args)?;

    let output_data = format_output(&payloads, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    output_format: OutputFormat,
    args: &AnalysisArgs,
    flush: bool,
) -> Result<(), GlucoseCliError> {
    let mut processor = build_processor(args)?;
    let offset: FixedOffset = processor.config().offset()?;

    // the first day settles the unit for the rest of the stream
    let mut unit = args.unit.map(UnitSystem::from);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut days = DayBuffer::new(offset);

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: RawEvent = serde_json::from_str(trimmed).map_err(|e| {
            GlucoseCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        record.validate()?;

        match days.push(record) {
            Push::Buffered => {}
            Push::Late(timestamp) => {
                warn!(
                    line = line_num + 1,
                    %timestamp,
                    "Dropping record for a day that was already analyzed"
                );
            }
            Push::DayComplete(records) => {
                let (payloads, settled) =
                    analyze_records(&mut processor, &records, unit, &args.subject_id)?;
                unit = unit.or(settled);
                write!(stdout, "{}", format_output(&payloads, &output_format)?)?;
                if flush {
                    stdout.flush()?;
                }
            }
        }
    }

    let remaining = days.finish();
    if !remaining.is_empty() {
        let (payloads, _) = analyze_records(&mut processor, &remaining, unit, &args.subject_id)?;
        write!(stdout, "{}", format_output(&payloads, &output_format)?)?;
        stdout.flush()?;
    }

    save_ledger(&processor, args)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), GlucoseCliError> {
    let records = parse_records(&read_input(input)?, &input_format)?;
    let results = RawEventAdapter::validate_events(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_id: r.event_id.clone(),
                error: r.result.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.event_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(GlucoseCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn check_file<T>(
    name: &str,
    path: &Path,
    load: impl FnOnce(&str) -> Result<T, String>,
    describe: impl FnOnce(&T) -> String,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck::new(name, CheckStatus::Warning, format!("{} does not exist", path.display()));
    }
    match fs::read_to_string(path) {
        Ok(content) => match load(&content) {
            Ok(value) => DoctorCheck::new(name, CheckStatus::Ok, describe(&value)),
            Err(e) => DoctorCheck::new(name, CheckStatus::Error, format!("Invalid {}: {}", name, e)),
        },
        Err(e) => DoctorCheck::new(name, CheckStatus::Error, format!("Cannot read {} file: {}", name, e)),
    }
}

fn cmd_doctor(config: Option<&Path>, ledger: Option<&Path>, json: bool) -> Result<(), GlucoseCliError> {
    let mut checks = vec![
        DoctorCheck::new(
            "engine_version",
            CheckStatus::Ok,
            format!("Glucose Flux version {}", ENGINE_VERSION),
        ),
        DoctorCheck::new(
            "schema_version",
            CheckStatus::Ok,
            format!("Input schema: {}", SCHEMA_VERSION),
        ),
    ];

    if let Some(path) = config {
        checks.push(check_file(
            "config",
            path,
            |content| AnalyticsConfig::from_json(content).map_err(|e| e.to_string()),
            |config| {
                format!(
                    "Configuration valid (target {}-{} mmol/L, UTC offset {} min)",
                    config.range_low_mmol, config.range_high_mmol, config.utc_offset_minutes
                )
            },
        ));
    }

    if let Some(path) = ledger {
        checks.push(check_file(
            "ledger",
            path,
            |content| ScoreLedger::from_json(content).map_err(|e| e.to_string()),
            |ledger| format!("Ledger valid ({} days recorded)", ledger.days()),
        ));
    }

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck::new("stdin", CheckStatus::Ok, stdin_message.to_string()));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Glucose Flux Doctor Report");
        println!("==========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error)) {
        Err(GlucoseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), GlucoseCliError> {
    match (schema_type, json_schema) {
        (SchemaType::Input, true) => println!("{}", input_json_schema()),
        (SchemaType::Output, true) => println!("{}", output_json_schema()),
        (SchemaType::Input, false) => {
            println!("Input Schema: {}", SCHEMA_VERSION);
            println!();
            println!("Every record carries schema_version, timestamp and record_type:");
            println!();
            println!("1. reading - A glucose sample");
            println!("   - value: positive number");
            println!("   - unit: mmol | mgdl (optional; detected from the series mean when absent)");
            println!();
            println!("2. meal - A food log entry");
            println!("   - label: food name (trimmed and lowercased)");
            println!();
            println!("3. insulin - An insulin dose log entry");
            println!("   - label: insulin product");
            println!();
            println!("Optional on every record: event_id, subject_id, source {{ provider, device_id }}");
        }
        (SchemaType::Output, false) => {
            println!("Output Schema: daily report {}", glucose_flux::encoder::REPORT_VERSION);
            println!();
            println!("- report_version, producer {{ name, version, instance_id }}");
            println!("- provenance: {{ subject_id, utc_offset_minutes, computed_at_utc }}");
            println!("- date, unit, unit_label");
            println!("- day: {{ average, standard_deviation, variability_pct, percent_in_range,");
            println!("         range {{ below, in_range, above, total }}, avg_score, composite_score,");
            println!("         peak, delta, time_to_baseline_minutes, sample_count }} | null");
            println!("- day_skipped_reason: why day is null (omitted otherwise)");
            println!("- events: [{{ label, kind, baseline_value, peak_value, delta,");
            println!("            time_to_baseline_minutes, time_score, peak_score, delta_score,");
            println!("            composite_score }}]");
            println!("- skipped_events: [{{ timestamp, label, reason }}]");
            println!("- persisted: written | already_recorded | day_open | null");
        }
    }

    Ok(())
}

fn format_output(payloads: &[ReportPayload], format: &OutputFormat) -> Result<String, GlucoseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for payload in payloads {
                out.push_str(&serde_json::to_string(payload)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(payloads)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(payloads)?),
    }
}

fn input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/glucose.raw_event.v1.json",
        "title": SCHEMA_VERSION,
        "description": "Glucose reading, meal and insulin record",
        "type": "object",
        "required": ["schema_version", "timestamp", "record_type"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "event_id": { "type": "string" },
            "timestamp": { "type": "string", "format": "date-time" },
            "subject_id": { "type": "string" },
            "record_type": { "type": "string", "enum": ["reading", "meal", "insulin"] },
            "value": { "type": "number", "exclusiveMinimum": 0 },
            "unit": { "type": "string", "enum": ["mmol", "mgdl"] },
            "label": { "type": "string", "minLength": 1 },
            "source": {
                "type": "object",
                "required": ["provider"],
                "properties": {
                    "provider": { "type": "string" },
                    "device_id": { "type": "string" }
                }
            }
        }
    })
    .to_string()
}

fn output_json_schema() -> String {
    let number = serde_json::json!({ "type": "number" });
    let nullable_number = serde_json::json!({ "type": ["number", "null"] });
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/glucose.daily_report.v1.json",
        "title": "glucose.daily_report",
        "type": "object",
        "required": ["report_version", "producer", "provenance", "date", "unit", "day", "events"],
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
                    "subject_id": { "type": "string" },
                    "utc_offset_minutes": { "type": "integer" },
                    "computed_at_utc": { "type": "string" }
                }
            },
            "date": { "type": "string", "format": "date" },
            "unit": { "type": "string", "enum": ["mmol", "mgdl"] },
            "unit_label": { "type": "string" },
            "day_skipped_reason": { "type": "string" },
            "day": {
                "type": ["object", "null"],
                "properties": {
                    "average": number,
                    "standard_deviation": number,
                    "variability_pct": number,
                    "percent_in_range": number,
                    "avg_score": number,
                    "composite_score": number,
                    "peak": number,
                    "delta": number,
                    "time_to_baseline_minutes": nullable_number,
                    "sample_count": { "type": "integer" }
                }
            },
            "events": { "type": "array", "items": { "type": "object" } },
            "skipped_events": { "type": "array", "items": { "type": "object" } },
            "persisted": { "type": ["string", "null"], "enum": ["written", "already_recorded", "day_open", null] }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum GlucoseCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Validation(ValidationError),
    NoRecords,
    NoReports,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for GlucoseCliError {
    fn from(e: io::Error) -> Self {
        GlucoseCliError::Io(e)
    }
}

impl From<ComputeError> for GlucoseCliError {
    fn from(e: ComputeError) -> Self {
        GlucoseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for GlucoseCliError {
    fn from(e: serde_json::Error) -> Self {
        GlucoseCliError::Json(e)
    }
}

impl From<ValidationError> for GlucoseCliError {
    fn from(e: ValidationError) -> Self {
        GlucoseCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<ComputeError> for CliError {
    fn from(e: ComputeError) -> Self {
        let message = e.to_string();
        match e {
            ComputeError::InsufficientData(_) => CliError::new(
                "INSUFFICIENT_DATA",
                message,
                "Provide at least two readings per day",
            ),
            ComputeError::AmbiguousUnits { .. } => CliError::new(
                "AMBIGUOUS_UNITS",
                message,
                "Pass --unit mmol or --unit mgdl",
            ),
            ComputeError::InvalidConfig(_) => CliError::new(
                "CONFIG_ERROR",
                message,
                "Run 'glucose-flux doctor --config <file>' for details",
            ),
            ComputeError::StoreError(_) => CliError::new(
                "LEDGER_ERROR",
                message,
                "Check the ledger file",
            ),
            _ => CliError::new(
                "PARSE_ERROR",
                message,
                "Ensure input matches the glucose.raw_event.v1 schema",
            ),
        }
    }
}

impl From<GlucoseCliError> for CliError {
    fn from(e: GlucoseCliError) -> Self {
        match e {
            GlucoseCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
            }
            GlucoseCliError::Compute(e) => CliError::from(e),
            GlucoseCliError::Json(e) => CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax"),
            GlucoseCliError::Validation(e) => CliError::new(
                "VALIDATION_ERROR",
                e.to_string(),
                "Run 'glucose-flux validate' for details",
            ),
            GlucoseCliError::NoRecords => CliError::new(
                "NO_RECORDS",
                "No records found in input".to_string(),
                "Ensure input file is not empty",
            ),
            GlucoseCliError::NoReports => CliError::new(
                "NO_REPORTS",
                "No day had enough readings to score".to_string(),
                "Check that the input contains reading records",
            ),
            GlucoseCliError::ValidationFailed(count) => CliError::new(
                "VALIDATION_FAILED",
                format!("{} records failed validation", count),
                "Fix validation errors and retry",
            ),
            GlucoseCliError::DoctorFailed => CliError::new(
                "DOCTOR_FAILED",
                "One or more health checks failed".to_string(),
                "Review the doctor report for details",
            ),
            GlucoseCliError::ParseError(msg) => CliError::new("PARSE_ERROR", msg, "Check input format"),
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: String) -> Self {
        DoctorCheck {
            name: name.to_string(),
            status,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Offset, TimeZone};

    fn reading(day: u32, hour: u32) -> RawEvent {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap();
        RawEvent::reading(timestamp, 100.0, None)
    }

    #[test]
    fn test_day_buffer_completes_on_later_day() {
        let mut days = DayBuffer::new(Utc.fix());
        assert!(matches!(days.push(reading(4, 8)), Push::Buffered));
        assert!(matches!(days.push(reading(4, 9)), Push::Buffered));

        match days.push(reading(5, 1)) {
            Push::DayComplete(records) => assert_eq!(records.len(), 2),
            _ => panic!("expected the 4th to complete"),
        }
        assert_eq!(days.finish().len(), 1);
    }

    #[test]
    fn test_day_buffer_drops_records_for_analyzed_days() {
        let mut days = DayBuffer::new(Utc.fix());
        days.push(reading(4, 8));
        days.push(reading(5, 8));

        assert!(matches!(days.push(reading(4, 22)), Push::Late(_)));
        assert!(matches!(days.push(reading(3, 22)), Push::Late(_)));
        assert_eq!(days.finish().len(), 1);
    }

    #[test]
    fn test_day_buffer_keeps_earlier_records_before_any_analysis() {
        let mut days = DayBuffer::new(Utc.fix());
        days.push(reading(5, 8));
        assert!(matches!(days.push(reading(4, 23)), Push::Buffered));
        assert_eq!(days.finish().len(), 2);
    }

    #[test]
    fn test_day_buffer_uses_local_days() {
        // 23:30 UTC is already the 5th at UTC+01:00
        let offset = FixedOffset::east_opt(3600).unwrap();
        let mut days = DayBuffer::new(offset);
        days.push(reading(4, 12));

        let late_evening = RawEvent::reading(
            Utc.with_ymd_and_hms(2024, 3, 4, 23, 30, 0).unwrap(),
            100.0,
            None,
        );
        assert!(matches!(days.push(late_evening), Push::DayComplete(_)));
    }
}
