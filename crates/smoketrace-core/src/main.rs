//! Smoketrace CLI
//!
//! Command-line interface for inspecting a fake trace backend.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use smoketrace::backend::{Backend, HttpBackend};
use smoketrace::collector::{self, Collection, StabilityPolicy};
use smoketrace::Config;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Smoketrace - trace collection checks for instrumentation smoke tests
#[derive(Parser)]
#[command(name = "smoketrace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SMOKETRACE_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the fake backend (overrides configuration)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Stability overrides shared by the commands that read the backend
#[derive(Args, Debug, Default)]
struct PollArgs {
    /// Give up waiting for the payload to settle after this long (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    deadline: Option<Duration>,

    /// Delay between fetches (e.g. "500ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Payloads of this length or shorter never count as stable
    #[arg(long)]
    min_length: Option<usize>,
}

impl PollArgs {
    fn policy(&self, config: &Config) -> StabilityPolicy {
        let mut policy = StabilityPolicy::from(&config.stability);
        if let Some(deadline) = self.deadline {
            policy = policy.with_deadline(deadline);
        }
        if let Some(interval) = self.poll_interval {
            policy = policy.with_poll_interval(interval);
        }
        if let Some(min_length) = self.min_length {
            policy = policy.with_min_length(min_length);
        }
        policy
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for exports to settle, decode them and print a summary
    Wait {
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Print the values of an attribute across collected exports
    Attrs {
        /// Attribute key (e.g. "service.name")
        key: String,

        /// Search span attributes instead of resource attributes
        #[arg(long)]
        span: bool,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// List collected spans
    Spans {
        /// Only spans with this name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Clear the backend's export store
    Reset,

    /// Check backend readiness
    Health {
        /// Keep polling until healthy or this much time has passed
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Interval between readiness probes in `health --timeout`
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = &cli.backend_url {
        config.backend.url.clone_from(url);
    }

    init_logging(&config, cli.verbose);
    debug!(backend = %config.backend.url, "Configuration loaded");

    // Execute command
    let result = match cli.command {
        Commands::Wait { poll } => run_wait(&config, &poll, cli.format).await,
        Commands::Attrs { key, span, poll } => {
            run_attrs(&config, &poll, &key, span, cli.format).await
        }
        Commands::Spans { name, poll } => {
            run_spans(&config, &poll, name.as_deref(), cli.format).await
        }
        Commands::Reset => run_reset(&config).await,
        Commands::Health { timeout } => run_health(&config, timeout, cli.format).await,
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn backend(config: &Config) -> anyhow::Result<HttpBackend> {
    HttpBackend::new(&config.backend)
        .with_context(|| format!("Failed to create backend client for {}", config.backend.url))
}

async fn collect(config: &Config, poll: &PollArgs) -> anyhow::Result<Collection> {
    let backend = backend(config)?;
    let policy = poll.policy(config);
    info!(
        backend = %config.backend.url,
        deadline = ?policy.deadline,
        "Waiting for exports to settle"
    );

    let collection = collector::collect(&backend, &policy)
        .await
        .context("Failed to collect traces")?;
    if !collection.content.stable {
        warn!(
            attempts = collection.content.attempts,
            "Payload was still changing at the deadline"
        );
    }
    Ok(collection)
}

async fn run_wait(config: &Config, poll: &PollArgs, format: OutputFormat) -> anyhow::Result<()> {
    let collection = collect(config, poll).await?;
    let stable = collection.content.stable;
    let attempts = collection.content.attempts;
    let elapsed = collection.content.elapsed;
    let failures: Vec<String> = collection
        .report
        .failures
        .iter()
        .map(ToString::to_string)
        .collect();
    let summary = collection.into_graph().summary();

    match format {
        OutputFormat::Json => {
            let output = json!({
                "stable": stable,
                "attempts": attempts,
                "elapsed_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "summary": summary,
                "failures": failures,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Stable:         {stable} ({attempts} fetches, {elapsed:.1?})");
            println!("Export records: {}", summary.records);
            println!("Spans:          {} ({} unique)", summary.spans, summary.unique_spans);
            println!("Traces:         {}", summary.traces);
            println!("Error spans:    {}", summary.error_spans);
            println!("Services:       {}", summary.services.join(", "));
            for failure in &failures {
                println!("Skipped:        {failure}");
            }
        }
    }

    Ok(())
}

async fn run_attrs(
    config: &Config,
    poll: &PollArgs,
    key: &str,
    span: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let graph = collect(config, poll).await?.into_graph();
    let values: Vec<_> = if span {
        graph.find_span_attributes(key).collect()
    } else {
        graph.find_resource_attributes(key).collect()
    };

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = values.iter().map(|v| v.to_json()).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for value in values {
                println!("{value}");
            }
        }
    }

    Ok(())
}

async fn run_spans(
    config: &Config,
    poll: &PollArgs,
    name: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let graph = collect(config, poll).await?.into_graph();
    let spans: Vec<_> = graph
        .spans()
        .filter(|span| name.map_or(true, |name| span.name == name))
        .collect();

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = spans
                .iter()
                .map(|span| {
                    json!({
                        "trace_id": span.trace_id,
                        "span_id": span.span_id,
                        "parent_span_id": span.parent_span_id,
                        "name": span.name,
                        "kind": span.kind.as_str(),
                        "duration_ms": span.duration().map(|d| d.as_secs_f64() * 1000.0),
                        "error": span.is_error(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for span in spans {
                let duration = span
                    .duration()
                    .map_or_else(|| "-".to_string(), |d| format!("{d:.1?}"));
                println!(
                    "{} {} {:<12} {:>10} {}{}",
                    span.trace_id,
                    span.span_id,
                    span.kind.as_str(),
                    duration,
                    span.name,
                    if span.is_error() { " [error]" } else { "" }
                );
            }
        }
    }

    Ok(())
}

async fn run_reset(config: &Config) -> anyhow::Result<()> {
    backend(config)?
        .reset()
        .await
        .context("Failed to clear backend requests")?;
    println!("Backend requests cleared");
    Ok(())
}

async fn run_health(
    config: &Config,
    timeout: Option<Duration>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let backend = backend(config)?;

    let healthy = match timeout {
        Some(timeout) => backend
            .wait_until_healthy(timeout, HEALTH_POLL_INTERVAL)
            .await
            .is_ok(),
        None => backend.is_healthy().await,
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({"backend": config.backend.url, "healthy": healthy})
        ),
        OutputFormat::Text => println!(
            "Backend {}: {}",
            config.backend.url,
            if healthy { "healthy" } else { "unavailable" }
        ),
    }

    if !healthy {
        anyhow::bail!("backend at {} is not healthy", config.backend.url);
    }
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "smoketrace", &mut io::stdout());
}
