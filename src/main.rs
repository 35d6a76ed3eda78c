use anyhow::{Context, Result};
use clap::Parser;
use cloudconn::{
    ConnectionConfig, Headers, Method, ParsedResponse, ReqwestTransport, RetryingConnection,
};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

/// cloudconn - probe a cloud API endpoint through the retrying connection
///
/// Transient network failures (DNS, refused, reset) are retried; an HTTP 429
/// response is reported as a rate limit together with the provider's
/// retry-after hint.
///
/// Examples:
///   cloudconn request https://api.example.com /v1/nodes
///   cloudconn --max-retries 5 request https://api.example.com /v1/nodes -X POST -d '{}'
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON connection config file (also via CLOUDCONN_CONFIG)
    #[arg(
        long = "config",
        short = 'c',
        env = "CLOUDCONN_CONFIG",
        value_name = "PATH",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Per-attempt timeout in seconds
    #[arg(long, env = "CLOUDCONN_TIMEOUT", value_name = "SECS", global = true)]
    pub timeout: Option<f64>,

    /// Delay before each retry in seconds
    #[arg(
        long = "retry-delay",
        env = "CLOUDCONN_RETRY_DELAY",
        value_name = "SECS",
        global = true
    )]
    pub retry_delay: Option<f64>,

    /// Number of retries after the first attempt
    #[arg(
        long = "max-retries",
        env = "CLOUDCONN_MAX_RETRIES",
        value_name = "N",
        global = true
    )]
    pub max_retries: Option<usize>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send one request and print the response
    Request(RequestArgs),
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// Base URL of the provider API
    #[arg(value_name = "BASE_URL")]
    pub base_url: String,

    /// Request path, appended to the base URL
    #[arg(value_name = "PATH", default_value = "/")]
    pub path: String,

    /// HTTP method
    #[arg(short = 'X', long = "method", default_value = "GET")]
    pub method: Method,

    /// Extra request header, may be repeated
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long = "data", value_name = "BODY")]
    pub data: Option<String>,

    /// Print response headers
    #[arg(short = 'i', long = "include")]
    pub include: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = connection_config(&cli)?;

    match cli.command {
        Commands::Request(args) => request(config, args).await?,
    }
    Ok(())
}

/// File settings first, then command-line/environment overrides.
fn connection_config(cli: &Cli) -> Result<ConnectionConfig> {
    let base = match &cli.config {
        Some(path) => ConnectionConfig::load(path)?,
        None => ConnectionConfig::default(),
    };

    let timeout = match cli.timeout {
        Some(secs) => seconds(secs, "--timeout")?,
        None => base.timeout(),
    };
    let retry_delay = match cli.retry_delay {
        Some(secs) => seconds(secs, "--retry-delay")?,
        None => base.retry_delay(),
    };
    let max_retries = cli.max_retries.unwrap_or(base.max_retries());

    ConnectionConfig::new(timeout, retry_delay, max_retries).with_backoff(base.backoff())
}

fn seconds(secs: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid {}: {} is not a valid number of seconds", flag, secs))
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Invalid header '{}'. Expected 'Name: value'.", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid header '{}'. Header name is empty.", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

async fn request(config: ConnectionConfig, args: RequestArgs) -> Result<()> {
    let headers = args
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<Headers>>()?;

    let client = Client::builder().user_agent("cloudconn-cli").build()?;
    let transport = ReqwestTransport::new(client, args.base_url);
    let connection = RetryingConnection::new(transport, config);

    let response = connection
        .execute(
            &args.path,
            args.method,
            headers,
            args.data.map(String::into_bytes),
        )
        .await?;

    print_response(&response, args.include);
    Ok(())
}

fn print_response(response: &ParsedResponse, include: bool) {
    println!("{}", response.exchange().status_line);
    if include {
        for (name, value) in response.headers().iter() {
            println!("{}: {}", name, value);
        }
    }
    println!();
    println!("{}", response.text());
}
