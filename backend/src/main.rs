//! csvfetch CLI - parse local or remote CSV into JSON
//!
//! ```bash
//! csvfetch parse input.csv --delimiter ';' --trim     # Parse a local file
//! csvfetch fetch https://example.com/data.csv         # Fetch and parse a remote CSV
//! csvfetch serve                                      # Start HTTP server (port 3000)
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use csvfetch::{
    decode_content, detect_delimiter, detect_encoding, parse,
    CsvFetcher, FetchRequest, HttpFetcher, ParseConfiguration, ServiceConfig, Table,
};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "csvfetch")]
#[command(about = "Parse CSV from files or URLs into JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Guess the delimiter from the first line
        #[arg(long, conflicts_with = "delimiter")]
        detect_delimiter: bool,

        #[command(flatten)]
        options: ParseOptions,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Fetch a remote CSV and output JSON
    Fetch {
        /// URL of the CSV resource
        url: String,

        /// Accept any response content type
        #[arg(long)]
        any_content_type: bool,

        #[command(flatten)]
        options: ParseOptions,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Start HTTP API server
    Serve {
        /// Port to listen on (default: CSVFETCH_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Args)]
struct ParseOptions {
    /// Field delimiter
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// Collapse doubled quotes inside quoted fields
    #[arg(long)]
    sanitize: bool,

    /// Trim whitespace around fields
    #[arg(long)]
    trim: bool,

    /// Treat backslash as an escape character
    #[arg(long)]
    backslash_escapes: bool,

    /// Skip comments starting with '#'
    #[arg(long)]
    comments: bool,

    /// Accept spreadsheet-style ="..." fields
    #[arg(long)]
    leading_equal: bool,
}

impl ParseOptions {
    fn to_config(&self) -> ParseConfiguration {
        ParseConfiguration::default()
            .with_delimiter(self.delimiter)
            .with_sanitize_fields(self.sanitize)
            .with_trim_whitespace(self.trim)
            .with_backslash_escapes(self.backslash_escapes)
            .with_comments(self.comments)
            .with_leading_equal_sign(self.leading_equal)
    }
}

#[derive(Args)]
struct OutputOptions {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            detect_delimiter,
            options,
            output,
        } => cmd_parse(&input, detect_delimiter, &options, &output),

        Commands::Fetch {
            url,
            any_content_type,
            options,
            output,
        } => cmd_fetch(url, any_content_type, &options, &output).await,

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(
    input: &Path,
    auto_delimiter: bool,
    options: &ParseOptions,
    output: &OutputOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let bytes = fs::read(input)?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding)?;

    let mut config = options.to_config();
    if auto_delimiter {
        config = config.with_delimiter(detect_delimiter(&content));
    }

    eprintln!("   Encoding: {}", encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(config.delimiter),
        if auto_delimiter { " (auto-detected)" } else { "" }
    );

    let table = parse(&content, config)?;
    eprintln!(
        "✅ Parsed {} rows ({} columns max)",
        table.len(),
        table.max_width()
    );

    write_output(&render(&table, config.delimiter, output.format)?, output.output.as_deref())
}

async fn cmd_fetch(
    url: String,
    any_content_type: bool,
    options: &ParseOptions,
    output: &OutputOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🌐 Fetching: {}", url);

    let service = ServiceConfig::from_env()?;
    let config = options.to_config();
    let fetcher = CsvFetcher::new(HttpFetcher::from_config(&service)?).with_config(config);

    let mut request = FetchRequest::csv(url).with_timeout(service.timeout);
    if any_content_type {
        request = request.accept_any_content_type();
    }

    // Exactly one continuation runs, so one message arrives.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let failure_tx = tx.clone();
    fetcher.spawn(
        request,
        move |response| {
            let _ = tx.send(Ok(response));
        },
        move |failure| {
            let _ = failure_tx.send(Err(failure));
        },
    );
    let outcome = rx.recv().await.ok_or("fetch task ended without a result")?;

    match outcome {
        Ok(response) => {
            eprintln!(
                "✅ {} {} - {} rows",
                response.response.status,
                response.response.content_type.as_deref().unwrap_or("(no content type)"),
                response.table.len()
            );
            write_output(
                &render(&response.table, config.delimiter, output.format)?,
                output.output.as_deref(),
            )
        }
        Err(failure) => Err(failure.into()),
    }
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(port) = port {
        config = config.with_port(port);
    }
    csvfetch::server::start_server(config).await?;
    Ok(())
}

fn render(table: &Table, delimiter: char, format: Format) -> Result<String, serde_json::Error> {
    match format {
        Format::Json => serde_json::to_string_pretty(table),
        Format::Csv => Ok(table.to_csv(delimiter)),
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
