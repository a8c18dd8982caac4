use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcloud_client::bigquery::{self, Bigquery, DatasetListOptions};
use gcloud_client::storage::{self, FileListOptions, Storage};
use gcloud_client::{ClientConfig, GcpClient, GcpCredentials, ListOptions, Page, Resource};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// List BigQuery and Cloud Storage resources
#[derive(Parser, Debug)]
#[command(name = "gcloud-client", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Bearer token to use instead of Application Default Credentials
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Base URL for both APIs (emulators)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Maximum number of results
    #[arg(long, global = true)]
    max: Option<u32>,

    /// Page token from a previous listing
    #[arg(long, global = true)]
    token: Option<String>,

    #[arg(short, long, global = true, value_enum, default_value = "json")]
    output: OutputFormat,

    /// Log level; RUST_LOG takes precedence when set
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List datasets
    Datasets {
        /// Include hidden datasets
        #[arg(long)]
        all: bool,
    },
    /// List the tables and views of a dataset
    Tables { dataset: String },
    /// List buckets
    Buckets {
        #[arg(long)]
        prefix: Option<String>,
    },
    /// List the objects of a bucket
    Files {
        bucket: String,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        delimiter: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// One page of results as printed
#[derive(Debug, Serialize)]
struct Listing {
    items: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    prefixes: Vec<String>,
}

impl Listing {
    fn from_page<T: Resource>(page: Page<T>) -> Self {
        Self {
            items: page.iter().map(|item| item.representation().to_value()).collect(),
            next_token: page.token,
            total: page.total,
            prefixes: page.prefixes,
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level.to_tracing_level()?.to_string()),
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {:?}: {}", log_path, e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcloud-client started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gcloud-client").join("gcloud-client.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gcloud-client").join("gcloud-client.log");
    }
    PathBuf::from("gcloud-client.log")
}

async fn build_client(args: &Args) -> Result<GcpClient> {
    let mut config = ClientConfig::load();
    if let Some(endpoint) = &args.endpoint {
        let endpoint = endpoint.trim_end_matches('/');
        config.bigquery_endpoint = endpoint.to_string();
        config.storage_endpoint = endpoint.to_string();
    }

    let client = match &args.access_token {
        Some(token) => GcpClient::with_credentials(config, GcpCredentials::from_token(token.as_str()))?,
        None => GcpClient::new(config)
            .await
            .context("Failed to initialize credentials")?,
    };
    Ok(client)
}

async fn resolve_project(args: &Args, client: &GcpClient, service_env: &str) -> Result<String> {
    match client
        .config()
        .effective_project(args.project.as_deref(), service_env)
    {
        Ok(project) => Ok(project),
        Err(e) => client
            .credentials
            .project_id()
            .await
            .ok_or(e)
            .context("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project"),
    }
}

async fn run(args: &Args) -> Result<Listing> {
    let client = build_client(args).await?;

    let listing = match &args.command {
        Command::Datasets { all } => {
            let project = resolve_project(args, &client, bigquery::PROJECT_ENV).await?;
            let bigquery = Bigquery::with_client(client, project);
            let options = DatasetListOptions {
                all: *all,
                token: args.token.clone(),
                max: args.max,
            };
            Listing::from_page(bigquery.datasets(&options).await?)
        },
        Command::Tables { dataset } => {
            let project = resolve_project(args, &client, bigquery::PROJECT_ENV).await?;
            let bigquery = Bigquery::with_client(client, project);
            let dataset = bigquery
                .dataset(dataset)
                .await?
                .with_context(|| format!("Dataset {} not found", dataset))?;
            let options = ListOptions {
                prefix: None,
                token: args.token.clone(),
                max: args.max,
            };
            let page = dataset.tables(&options).await?;
            Listing {
                items: page
                    .iter()
                    .map(|table| table.representation().to_value())
                    .collect(),
                next_token: page.token,
                total: page.total,
                prefixes: page.prefixes,
            }
        },
        Command::Buckets { prefix } => {
            let project = resolve_project(args, &client, storage::PROJECT_ENV).await?;
            let storage = Storage::with_client(client, project);
            let options = ListOptions {
                prefix: prefix.clone(),
                token: args.token.clone(),
                max: args.max,
            };
            Listing::from_page(storage.buckets(&options).await?)
        },
        Command::Files {
            bucket,
            prefix,
            delimiter,
        } => {
            let project = resolve_project(args, &client, storage::PROJECT_ENV).await?;
            let storage = Storage::with_client(client, project);
            let bucket = storage
                .bucket(bucket)
                .await?
                .with_context(|| format!("Bucket {} not found", bucket))?;
            let options = FileListOptions {
                prefix: prefix.clone(),
                delimiter: delimiter.clone(),
                token: args.token.clone(),
                max: args.max,
                versions: false,
            };
            Listing::from_page(bucket.files(&options).await?)
        },
    };

    Ok(listing)
}

fn render(listing: &Listing, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(listing)?,
        OutputFormat::Yaml => serde_yaml::to_string(listing)?,
    };
    Ok(text)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(&args).await {
        Ok(listing) => {
            println!("{}", render(&listing, args.output)?);
            Ok(())
        },
        Err(err) => {
            tracing::error!("Command failed: {:?}", err);
            let message = match err.downcast_ref::<gcloud_client::Error>() {
                Some(e) => e.user_message(),
                None => err.to_string(),
            };
            eprintln!("Error: {}", message);
            std::process::exit(1);
        },
    }
}
