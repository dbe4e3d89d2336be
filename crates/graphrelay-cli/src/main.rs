//! graphrelay CLI
//!
//! Unified command-line interface for:
//! - Serving the HTTP boundary in front of the relay chain (`serve`)
//! - Running a single query document through the chain (`query`)

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use url::Url;

use graphrelay_core::config::{
    self, RelayConfig, DEFAULT_LOOKUP_URL, DEFAULT_NORMALIZER_URL, DEFAULT_OVERLAY_URL,
    DEFAULT_SCORING_URL, DEFAULT_WEIGHTING_URL, LOOKUP_URL_ENV, NORMALIZER_URL_ENV,
    OVERLAY_URL_ENV, SCORING_URL_ENV, WEIGHTING_URL_ENV,
};
use graphrelay_core::{NodeNormalizer, Normalizer, Passthrough, Pipeline, Query};

mod server;

#[derive(Parser)]
#[command(name = "graphrelay")]
#[command(
    author,
    version,
    about = "Relay gateway for knowledge-graph reasoning queries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP boundary (`POST /query`).
    Serve(ServeArgs),

    /// Run one query document through the relay chain and print the answer.
    Query(QueryArgs),
}

#[derive(Args)]
struct EndpointArgs {
    /// Lookup stage endpoint.
    #[arg(long)]
    lookup_url: Option<Url>,

    /// Overlay stage endpoint.
    #[arg(long)]
    overlay_url: Option<Url>,

    /// Weighting stage endpoint.
    #[arg(long)]
    weighting_url: Option<Url>,

    /// Scoring stage endpoint.
    #[arg(long)]
    scoring_url: Option<Url>,

    /// Identifier-normalization service endpoint.
    #[arg(long)]
    normalizer_url: Option<Url>,

    /// Skip identifier normalization entirely (relay documents verbatim).
    #[arg(long)]
    skip_normalizer: bool,

    /// Per-call timeout (seconds) for downstream services. `0` waits
    /// indefinitely, which is the default policy.
    #[arg(long, default_value_t = 0)]
    request_timeout_secs: u64,
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address (use `127.0.0.1:0` to auto-pick a free port).
    #[arg(long, default_value = "127.0.0.1:4868")]
    listen: SocketAddr,

    /// If set, write a small JSON file once the server is listening.
    ///
    /// Useful for scripts/tests to learn the chosen port when `--listen ...:0`.
    #[arg(long)]
    ready_file: Option<PathBuf>,

    #[command(flatten)]
    endpoints: EndpointArgs,
}

#[derive(Args)]
struct QueryArgs {
    /// Query document (JSON file, or `-` for stdin).
    input: PathBuf,

    /// Pretty-print the answer document.
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    endpoints: EndpointArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => cmd_serve(args),
        Commands::Query(args) => cmd_query(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Flag → environment variable → built-in default.
fn resolve_url(flag: Option<Url>, env_var: &str, default: &str) -> Result<Url> {
    if let Some(url) = flag {
        return Ok(url);
    }
    if let Ok(raw) = std::env::var(env_var) {
        let raw = raw.trim();
        if !raw.is_empty() {
            return Url::parse(raw).with_context(|| format!("invalid URL in {env_var}: `{raw}`"));
        }
    }
    Url::parse(default).map_err(|e| anyhow!("invalid default endpoint `{default}`: {e}"))
}

fn relay_config(listen: SocketAddr, args: EndpointArgs) -> Result<RelayConfig> {
    let endpoints = graphrelay_core::StageEndpoints {
        lookup: resolve_url(args.lookup_url, LOOKUP_URL_ENV, DEFAULT_LOOKUP_URL)?,
        overlay: resolve_url(args.overlay_url, OVERLAY_URL_ENV, DEFAULT_OVERLAY_URL)?,
        weighting: resolve_url(args.weighting_url, WEIGHTING_URL_ENV, DEFAULT_WEIGHTING_URL)?,
        scoring: resolve_url(args.scoring_url, SCORING_URL_ENV, DEFAULT_SCORING_URL)?,
    };
    let normalizer_url = if args.skip_normalizer {
        None
    } else {
        Some(resolve_url(
            args.normalizer_url,
            NORMALIZER_URL_ENV,
            DEFAULT_NORMALIZER_URL,
        )?)
    };
    let request_timeout = if args.request_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(args.request_timeout_secs))
    };
    Ok(RelayConfig {
        listen,
        endpoints,
        normalizer_url,
        request_timeout,
    })
}

pub(crate) fn build_pipeline(config: &RelayConfig) -> Result<Pipeline> {
    let client = config::build_http_client(config.request_timeout)?;
    let normalizer: Arc<dyn Normalizer> = match &config.normalizer_url {
        Some(url) => Arc::new(NodeNormalizer::new(client.clone(), url.clone())),
        None => Arc::new(Passthrough),
    };
    Ok(Pipeline::new(client, config.endpoints.clone(), normalizer))
}

fn cmd_serve(args: ServeArgs) -> Result<()> {
    let config = relay_config(args.listen, args.endpoints)?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;
    rt.block_on(server::serve(config, args.ready_file))
}

fn cmd_query(args: QueryArgs) -> Result<()> {
    // Listen address is unused here; only the outbound side of the config matters.
    let config = relay_config("127.0.0.1:0".parse()?, args.endpoints)?;
    let query = read_query(&args.input)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;
    let answer = rt.block_on(async {
        let pipeline = build_pipeline(&config)?;
        pipeline.run(query).await.map_err(anyhow::Error::from)
    })?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&answer)?
    } else {
        serde_json::to_string(&answer)?
    };
    println!("{rendered}");
    eprintln!("{} relayed through all four stages", "ok".green().bold());
    Ok(())
}

fn read_query(input: &Path) -> Result<Query> {
    let text = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read query document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read query document `{}`", input.display()))?
    };
    serde_json::from_str(&text).context("query document failed validation")
}
