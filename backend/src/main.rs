//! CDE data model CLI - convert and validate spreadsheet / JSON data models
//!
//! # Commands
//!
//! ```bash
//! cde-datamodel serve                      # Start HTTP server (port 3000)
//! cde-datamodel to-json model.xlsx         # Spreadsheet -> JSON data model
//! cde-datamodel to-table model.json -o model.xlsx  # JSON data model -> XLSX
//! cde-datamodel to-table model.json        # JSON data model -> CSV on stdout
//! cde-datamodel validate-json model.json   # Validate a JSON data model
//! cde-datamodel validate-table model.csv   # Validate a spreadsheet
//! cde-datamodel parse model.csv            # Just read the table, print rows as JSON
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); results go to stdout or
//! the `--output` file.

use cde_datamodel::api::VALID_MESSAGE;
use cde_datamodel::{
    check_model_file, check_table_file, convert_model_file, convert_table_file,
    parse_table_file, ConvertOptions, OutputFormat, ServerConfig,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cde-datamodel")]
#[command(about = "Convert and validate CDE data models (spreadsheet <-> JSON)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a CSV/XLSX table and output its rows as JSON
    Parse {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a CSV/XLSX table into a JSON data model
    ToJson {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip table validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Convert a JSON data model into an XLSX or CSV table
    ToTable {
        /// Input JSON file
        input: PathBuf,

        /// Output file, XLSX or CSV by extension (default: CSV on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip data model validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Validate a JSON data model
    ValidateJson {
        /// Input JSON file
        input: PathBuf,
    },

    /// Validate a CSV/XLSX table
    ValidateTable {
        /// Input CSV or XLSX file
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CDE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (default: CDE_BIND_ADDR or 0.0.0.0)
        #[arg(short, long)]
        bind: Option<IpAddr>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::ToJson {
            input,
            output,
            no_validate,
        } => cmd_to_json(&input, output.as_deref(), no_validate),

        Commands::ToTable {
            input,
            output,
            no_validate,
        } => cmd_to_table(&input, output.as_deref(), no_validate),

        Commands::ValidateJson { input } => cmd_validate_json(&input),

        Commands::ValidateTable { input } => cmd_validate_table(&input),

        Commands::Serve { port, bind } => cmd_serve(port, bind).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn options(no_validate: bool) -> ConvertOptions {
    ConvertOptions {
        validate: !no_validate,
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let result = parse_table_file(input)?;
    eprintln!("Format: {}", result.format);
    eprintln!("Columns: {}", result.table.headers.join(", "));
    eprintln!("Parsed {} records", result.table.len());

    let json = serde_json::to_string_pretty(&result.table.rows())?;
    write_output(&json, output)
}

fn cmd_to_json(
    input: &Path,
    output: Option<&Path>,
    no_validate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = convert_table_file(input, &options(no_validate))?;
    let json = serde_json::to_string_pretty(&model)?;
    write_output(&json, output)
}

fn cmd_to_table(
    input: &Path,
    output: Option<&Path>,
    no_validate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = convert_model_file(input, &options(no_validate))?;
    match output {
        Some(path) => {
            let format = OutputFormat::from_path(path).unwrap_or(OutputFormat::Xlsx);
            fs::write(path, table.encode(format)?)?;
            eprintln!("Output written to: {}", path.display());
            Ok(())
        }
        None => write_output(&table.to_csv()?, None),
    }
}

fn cmd_validate_json(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    check_model_file(input)?;
    println!("{VALID_MESSAGE}");
    Ok(())
}

fn cmd_validate_table(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    check_table_file(input)?;
    println!("{VALID_MESSAGE}");
    Ok(())
}

async fn cmd_serve(port: Option<u16>, bind: Option<IpAddr>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?
        .with_port(port)
        .with_bind_addr(bind);
    cde_datamodel::server::start_server(config).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content.trim_end());
        }
    }
    Ok(())
}
