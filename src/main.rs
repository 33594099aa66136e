//! CLI entry point for the GTFS-RT alert translator.
//!
//! `translate` runs once against an explicit (or configured) source;
//! `handle-event` takes an S3 notification payload and translates the object
//! it names.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtfs_rt_translator::{
    config::{SSM_PREFIX, Settings},
    event::source_from_event,
    fetch::{BasicClient, HttpClient},
    infra::{keys::SsmKeyStore, s3::S3Store},
    output::{append_record, log_metrics},
    pipeline::run_translation,
};
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_translator")]
#[command(about = "Translate GTFS-RT service alerts and publish the multilingual feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one feed and publish it to every destination
    Translate {
        /// Source feed (s3://, http(s):// or a local path); defaults to SOURCE_URL
        #[arg(short, long)]
        source: Option<String>,

        /// Destination URL, repeatable; defaults to DESTINATION_BUCKET_URLS
        #[arg(short, long = "dest")]
        dest: Vec<String>,

        /// CSV file to append run metrics to
        #[arg(long)]
        metrics_csv: Option<String>,
    },
    /// Translate the object named by an S3 event payload
    HandleEvent {
        /// JSON event file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        event: String,

        /// CSV file to append run metrics to
        #[arg(long)]
        metrics_csv: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_rt_translator.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_translator.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Commands::Translate {
            source,
            dest,
            metrics_csv,
        } => {
            let source = source
                .or_else(|| settings.source_url.clone())
                .context("no source URL given via --source or SOURCE_URL")?;
            if !dest.is_empty() {
                settings.destination_urls = dest;
            }
            translate(&mut settings, &source, metrics_csv.as_deref()).await?;
        }
        Commands::HandleEvent { event, metrics_csv } => {
            let raw = if event == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&event).with_context(|| format!("reading {event}"))?
            };
            let payload: serde_json::Value = serde_json::from_str(&raw).context("event is not JSON")?;

            let source = source_from_event(&payload)
                .or_else(|| settings.source_url.clone())
                .context("no source URL provided via environment or event")?;
            translate(&mut settings, &source, metrics_csv.as_deref()).await?;
            println!(r#"{{"statusCode":200,"body":"Translation completed"}}"#);
        }
    }

    Ok(())
}

/// Wires the AWS adapters and the configured translator into one run.
#[tracing::instrument(skip(settings, metrics_csv))]
async fn translate(settings: &mut Settings, source: &str, metrics_csv: Option<&str>) -> Result<()> {
    let aws = aws_config::load_from_env().await;

    let uses_ssm = [&settings.smartling.user_id, &settings.smartling.user_secret]
        .iter()
        .any(|v| v.starts_with(SSM_PREFIX));
    if uses_ssm {
        settings.resolve_secrets(&SsmKeyStore::new(&aws)).await?;
    }

    let provider_http: Arc<dyn HttpClient> = Arc::new(BasicClient::with_timeouts(
        Duration::from_secs(30),
        Duration::from_secs(10),
    )?);
    let translator = settings.build_translator(provider_http, source)?;
    let store = S3Store::new(&aws, Arc::new(BasicClient::new()));

    let outcome = run_translation(
        source,
        &settings.destination_urls,
        &store,
        translator.as_ref(),
        &settings.processor_options(),
    )
    .await?;

    log_metrics(&outcome.metrics, outcome.published.len())?;
    if let Some(path) = metrics_csv {
        append_record(path, &outcome.metrics)?;
    }
    info!(published = ?outcome.published, "Translation run finished");
    Ok(())
}
