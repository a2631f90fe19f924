//! piperow CLI: pipe CSV rows through a shell script.

use clap::{Parser, Subcommand};
use piperow_core::prelude::{Schema, TransformConfig};
use piperow_exec::ScriptTransform;
use piperow_io::readers::CsvReader;
use piperow_io::writers::JsonlWriter;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "piperow")]
#[command(about = "Stream records through an external script", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a CSV file through a script and write its output as JSONL
    Run {
        /// Script text, run as `<shell> <script>` (overrides config)
        #[arg(short, long)]
        script: Option<String>,

        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Transform config YAML (formats, shell, buffer sizes)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output JSONL file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat the first CSV record as data, not a header
        #[arg(long)]
        no_header: bool,

        /// Comma-separated output column names
        #[arg(long)]
        output_columns: Option<String>,
    },

    /// Validate a transform config YAML file
    Validate {
        /// Path to the config YAML file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            input,
            config,
            output,
            no_header,
            output_columns,
        } => {
            if let Err(e) = run_script(
                script,
                &input,
                config.as_deref(),
                output.as_deref(),
                !no_header,
                output_columns.as_deref(),
            ) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { config } => {
            if let Err(e) = load_config(&config).and_then(|c| Ok(c.validate()?)) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Config is valid");
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_script(
    script: Option<String>,
    input: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    has_headers: bool,
    output_columns: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => load_config(path)?,
        None => TransformConfig::from_env(),
    };
    if let Some(script) = script {
        config.script = script;
    }
    if config.script.trim().is_empty() {
        return Err("no script given (use --script or set `script` in the config)".into());
    }

    let reader = CsvReader::from_path(input, has_headers)?;
    let input_schema = reader.schema().clone();
    let output_schema = output_schema(&config, &input_schema, output_columns);

    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = JsonlWriter::to_writer(sink, &output_schema);

    let transform = ScriptTransform::new(config, input_schema, output_schema)?;
    let mut results = transform.execute_fallible(reader.rows())?;
    for row in results.by_ref() {
        writer.write_row(&row?)?;
    }
    let written = writer.rows_written();
    writer.finish()?;

    info!(
        rows_out = written,
        rows_in = ?results.records_fed(),
        exit_code = ?results.exit_code(),
        "script finished"
    );
    Ok(())
}

/// Output columns: explicit names, else `key`/`value` for schema-less
/// output, else the input columns.
fn output_schema(config: &TransformConfig, input: &Schema, columns: Option<&str>) -> Schema {
    if let Some(cols) = columns {
        let names: Vec<&str> = cols
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        return Schema::utf8(&names);
    }
    if config.output.schema_less && config.output.serde_name().is_none() {
        return Schema::utf8(&["key", "value"]);
    }
    input.clone()
}

fn load_config(path: &Path) -> Result<TransformConfig, Box<dyn std::error::Error>> {
    let yaml = fs::read_to_string(path)?;
    let config: TransformConfig = serde_yaml::from_str(&yaml)?;
    Ok(config)
}
