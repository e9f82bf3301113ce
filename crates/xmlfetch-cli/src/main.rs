use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use xmlfetch::{AnyTransport, Config, Fetcher, HttpTransport, Request, Value};

#[derive(Debug, Parser)]
#[command(
    name = "xmlfetch",
    version,
    about = "Fetch an XML document and print its records as JSON"
)]
struct Args {
    /// http:// URL, file:// URL or path (defaults to stdin)
    #[arg(value_name = "SOURCE")]
    source: Option<String>,
    /// Treat the root element as a wrapper; its children become the records
    #[arg(long)]
    wrapper: bool,
    /// Drop the first record
    #[arg(long)]
    skip_first: bool,
    /// Form-encoded body; sends a POST instead of a GET
    #[arg(short, long, value_name = "BODY")]
    data: Option<String>,
    /// Key used for element text next to attributes or children
    #[arg(long, value_name = "KEY", default_value = xmlfetch::config::DEFAULT_TEXT_KEY)]
    text_key: String,
    /// Trim surrounding whitespace from element text
    #[arg(long)]
    trim: bool,
    /// Drop namespace prefixes from element and attribute names
    #[arg(long)]
    strip_ns: bool,
    /// Seconds allowed for the whole HTTP exchange
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,
    /// Maximum element nesting depth
    #[arg(long, value_name = "N", default_value_t = xmlfetch::config::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config::new(self.wrapper, self.skip_first)
            .with_text_key(self.text_key.as_str())
            .with_trim_text(self.trim)
            .with_strip_namespace_prefix(self.strip_ns)
            .with_max_depth(self.max_depth)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "xmlfetch=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(args).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.config();
    debug!(?config, "configuration");

    let records = match &args.source {
        Some(source) => {
            let http = HttpTransport::new().with_timeout(Duration::from_secs(args.timeout));
            let fetcher = Fetcher::new(AnyTransport::new(http), config);
            let request = match &args.data {
                Some(body) => Request::post(source.as_str(), body.as_str()),
                None => Request::get(source.as_str()),
            };
            fetcher
                .fetch(&request)
                .await
                .with_context(|| format!("failed to fetch {source}"))?
        }
        None => {
            if args.data.is_some() {
                bail!("--data needs an http:// SOURCE");
            }
            let input = read_stdin()?;
            xmlfetch::from_xml_bytes_with_config(&input, &config)
                .context("failed to parse stdin")?
        }
    };

    write_output(&args.output, &render(&records, args.pretty)?)
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("failed to read stdin")?;
    if buffer.iter().all(u8::is_ascii_whitespace) {
        bail!("no input provided on stdin");
    }
    Ok(buffer)
}

fn render(records: &[Value], pretty: bool) -> Result<String> {
    let mut out = if pretty {
        serde_json::to_string_pretty(records)?
    } else {
        serde_json::to_string(records)?
    };
    out.push('\n');
    Ok(out)
}

fn write_output(path: &Option<PathBuf>, data: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            let mut stdout = io::stdout();
            stdout
                .write_all(data.as_bytes())
                .context("failed to write stdout")?;
            Ok(())
        }
    }
}
